//! Prometheus metrics exposition
//!
//! Gateway-level series:
//!
//! - `gateway_operations_total` (counter): labels `operation`, `route`, `outcome`
//! - `gateway_operation_duration_seconds` (histogram): label `route`
//!
//! The library crates add `transport_*`, `dispatch_fallback_total` and the
//! `backend_available` gauge through the same global recorder.

use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

const DURATION_METRIC: &str = "gateway_operation_duration_seconds";

/// From a local in-memory answer (sub-millisecond) up to the remote timeout.
const DURATION_BUCKETS: &[f64] = &[
    0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

fn builder() -> PrometheusBuilder {
    PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(DURATION_METRIC.to_string()), DURATION_BUCKETS)
        .expect("failed to set histogram buckets")
}

/// Install the Prometheus recorder and return a handle for rendering metrics.
pub fn install_recorder() -> PrometheusHandle {
    builder()
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

/// Record one gateway operation call.
///
/// `route` is `primary`, `fallback`, or `none` when no implementation ran.
pub fn record_operation(operation: &str, route: &str, outcome: &str, duration_secs: f64) {
    metrics::counter!(
        "gateway_operations_total",
        "operation" => operation.to_string(),
        "route" => route.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
    metrics::histogram!(DURATION_METRIC, "route" => route.to_string()).record(duration_secs);
}
