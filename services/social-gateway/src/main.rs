//! Social Gateway
//!
//! Single local access point for the UI shell:
//! 1. Loads the persisted session and configuration
//! 2. Checks the remote social service in the background
//! 3. Serves every catalog operation on `POST /ops/{name}`, routed to the
//!    remote service or the local in-memory fallback
//! 4. Exposes health, metrics, and the force-fallback override

mod admin;
mod config;
mod error;
mod metrics;
mod service;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use dispatch::{Availability, HealthMonitor};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::Value;
use session::CredentialStore;
use social_api::SocialClient;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transport::{RefreshCoordinator, Transport};

use crate::admin::AdminState;
use crate::config::Config;
use crate::error::ApiError;
use crate::service::{DRAIN_TIMEOUT, ServiceMetrics};

/// Shared application state accessible from all handlers
#[derive(Clone)]
struct AppState {
    client: SocialClient,
    metrics: ServiceMetrics,
    prometheus: PrometheusHandle,
}

/// Build the axum router with all routes and shared state.
fn build_router(state: AppState, max_connections: usize) -> Router {
    let admin = admin::build_admin_router(AdminState::new(state.client.dispatcher().clone()));
    Router::new()
        .route("/ops/{name}", post(operation_handler))
        .route("/session/logout", post(logout_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
        .merge(admin)
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
}

#[tokio::main]
async fn main() -> Result<()> {
    // JSON logs, filter from LOG_LEVEL then RUST_LOG
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting social-gateway");

    // Before any metric is emitted
    let prometheus_handle = metrics::install_recorder();

    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        listen_addr = %config.gateway.listen_addr,
        base_url = %config.remote.base_url,
        force_fallback = config.dispatch.force_fallback,
        server_errors_are_network = config.dispatch.server_errors_are_network,
        "configuration loaded"
    );

    let http = reqwest::Client::builder()
        .build()
        .context("failed to build HTTP client")?;

    let store = Arc::new(CredentialStore::load(config.session.credentials_path.clone()).await);
    let refresh = Arc::new(RefreshCoordinator::new(
        store,
        http.clone(),
        config.refresh_url(),
        config.remote_timeout(),
    ));

    let service_metrics = ServiceMetrics::new();
    let logout_watcher = service::watch_hard_logouts(refresh.subscribe(), service_metrics.clone());

    let transport = Arc::new(Transport::new(
        http.clone(),
        config.remote.base_url.clone(),
        config.remote_timeout(),
        refresh,
    ));

    let availability = Arc::new(Availability::new());
    let monitor = Arc::new(HealthMonitor::new(
        http,
        config.health_url(),
        config.check_timeout(),
        availability.clone(),
    ))
    .spawn(config.check_interval());

    let client = SocialClient::build(
        transport,
        availability,
        config.dispatch.force_fallback,
        config.failure_policy(),
    )
    .context("failed to build operation catalog")?;

    let app_state = AppState {
        client,
        metrics: service_metrics.clone(),
        prometheus: prometheus_handle,
    };

    let app = build_router(app_state, config.gateway.max_connections);

    let listen_addr = config.gateway.listen_addr;
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;
    info!(addr = %listen_addr, "accepting requests");

    // The drain timeout starts when the shutdown signal fires.
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;

    let _ = shutdown_tx.send(());

    match tokio::time::timeout(DRAIN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => {
            info!("all in-flight requests drained");
        }
        Ok(Ok(Err(e))) => {
            error!(error = %e, "server error during shutdown");
        }
        Ok(Err(e)) => {
            error!(error = %e, "server task panicked");
        }
        Err(_) => {
            warn!(
                drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
                "drain timeout exceeded, forcing shutdown"
            );
        }
    }

    monitor.stop().await;
    logout_watcher.abort();

    info!(
        requests_served = service_metrics.requests_total.load(Ordering::Relaxed),
        "shutdown complete"
    );
    Ok(())
}

/// `POST /ops/{name}`: run one catalog operation with the JSON body as args.
///
/// An empty body means "no arguments".
async fn operation_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Bytes,
) -> Response {
    let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
    let started = Instant::now();
    state.metrics.requests_total.fetch_add(1, Ordering::Relaxed);

    let dispatcher = state.client.dispatcher();
    // Unknown names share one label
    let label = if dispatcher.has_operation(&name) {
        name.as_str()
    } else {
        "unknown"
    };

    let args = match parse_args(&body) {
        Ok(args) => args,
        Err(e) => {
            state.metrics.errors_total.fetch_add(1, Ordering::Relaxed);
            metrics::record_operation(label, "none", "error", started.elapsed().as_secs_f64());
            return e.into_response(&request_id);
        }
    };

    match dispatcher.dispatch(&name, args).await {
        Ok(dispatched) => {
            metrics::record_operation(
                label,
                dispatched.route.as_str(),
                "ok",
                started.elapsed().as_secs_f64(),
            );
            (
                StatusCode::OK,
                [(axum::http::header::CONTENT_TYPE, "application/json")],
                dispatched.value.to_string(),
            )
                .into_response()
        }
        Err(err) => {
            state.metrics.errors_total.fetch_add(1, Ordering::Relaxed);
            let route = match &err {
                dispatch::Error::Primary(_) => "primary",
                dispatch::Error::Fallback(_) => "fallback",
                dispatch::Error::UnknownOperation(_) | dispatch::Error::DuplicateOperation(_) => {
                    "none"
                }
            };
            metrics::record_operation(label, route, "error", started.elapsed().as_secs_f64());
            let api_error = ApiError::from(&err);
            warn!(
                request_id = %request_id,
                operation = %name,
                route,
                status = api_error.status.as_u16(),
                error = %err,
                "operation failed"
            );
            api_error.into_response(&request_id)
        }
    }
}

fn parse_args(body: &[u8]) -> std::result::Result<Value, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError::invalid_request(format!("request body is not valid JSON: {e}")))
}

/// `POST /session/logout`: clear the session and raise a hard logout.
async fn logout_handler(State(state): State<AppState>) -> impl IntoResponse {
    state.client.logout().await;
    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        serde_json::json!({ "session": "logged_out" }).to_string(),
    )
}

/// Always 200: with the backend down the gateway still serves from the
/// local fallback, reported as `degraded`.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let dispatcher = state.client.dispatcher();
    let snapshot = dispatcher.availability().snapshot().await;
    let session = state.client.session().await;

    let body = serde_json::json!({
        "status": if snapshot.available { "healthy" } else { "degraded" },
        "backend_available": snapshot.available,
        "last_checked_ms_ago": snapshot
            .last_checked_at
            .map(|at| at.elapsed().as_millis() as u64),
        "force_fallback": dispatcher.force_fallback(),
        "session": if session.is_authenticated() { "authenticated" } else { "logged_out" },
        "uptime_seconds": state.metrics.started_at.elapsed().as_secs(),
        "requests_served": state.metrics.requests_total.load(Ordering::Relaxed),
        "errors_total": state.metrics.errors_total.load(Ordering::Relaxed),
        "hard_logouts": state.metrics.hard_logouts.load(Ordering::Relaxed),
    });

    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

/// Prometheus text exposition.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
