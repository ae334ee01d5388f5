//! Per-call routing between primary and fallback implementations
//!
//! Routing for an operation:
//! 1. force-fallback on, or backend believed unavailable → fallback
//! 2. otherwise primary
//!    - success → result
//!    - network-class failure → mark unavailable, then fallback
//!    - any other failure → propagated unchanged
//! 3. a failing fallback is terminal

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use transport::{Disposition, FailurePolicy, classify};

use crate::availability::Availability;
use crate::binding::OperationBinding;
use crate::error::{Error, Result};

/// Which implementation produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Primary,
    Fallback,
}

impl Route {
    pub fn as_str(self) -> &'static str {
        match self {
            Route::Primary => "primary",
            Route::Fallback => "fallback",
        }
    }
}

/// A result together with the route that served it.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatched {
    pub value: Value,
    pub route: Route,
}

pub struct Dispatcher {
    bindings: HashMap<String, OperationBinding>,
    availability: Arc<Availability>,
    force_fallback: AtomicBool,
    policy: FailurePolicy,
}

impl Dispatcher {
    /// Build from the full binding set. Names must be unique.
    pub fn new(
        bindings: impl IntoIterator<Item = OperationBinding>,
        availability: Arc<Availability>,
        force_fallback: bool,
        policy: FailurePolicy,
    ) -> Result<Self> {
        let mut map = HashMap::new();
        for binding in bindings {
            let name = binding.name().to_string();
            if map.insert(name.clone(), binding).is_some() {
                return Err(Error::DuplicateOperation(name));
            }
        }
        debug!(operations = map.len(), force_fallback, "dispatcher ready");

        Ok(Self {
            bindings: map,
            availability,
            force_fallback: AtomicBool::new(force_fallback),
            policy,
        })
    }

    pub fn availability(&self) -> &Arc<Availability> {
        &self.availability
    }

    pub fn force_fallback(&self) -> bool {
        self.force_fallback.load(Ordering::SeqCst)
    }

    /// Runtime override: when on, primaries are never invoked.
    pub fn set_force_fallback(&self, enabled: bool) {
        let previous = self.force_fallback.swap(enabled, Ordering::SeqCst);
        if previous != enabled {
            info!(enabled, "force-fallback toggled");
        }
    }

    pub fn has_operation(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Sorted operation names.
    pub fn operation_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.bindings.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Run operation `name`; the caller does not learn which path served it.
    pub async fn call(&self, name: &str, args: Value) -> Result<Value> {
        self.dispatch(name, args).await.map(|d| d.value)
    }

    /// Run operation `name` and report the route taken.
    #[instrument(skip_all, fields(operation = %name))]
    pub async fn dispatch(&self, name: &str, args: Value) -> Result<Dispatched> {
        let binding = self
            .bindings
            .get(name)
            .ok_or_else(|| Error::UnknownOperation(name.to_string()))?;

        if self.force_fallback() {
            return self.run_fallback(binding, args, "forced").await;
        }
        if !self.availability.is_available().await {
            return self.run_fallback(binding, args, "unavailable").await;
        }

        match binding.primary().invoke(args.clone()).await {
            Ok(value) => Ok(Dispatched {
                value,
                route: Route::Primary,
            }),
            // The transport already spent the one auth retry, hence `retried`.
            Err(err) => match classify(&err, true, self.policy) {
                Disposition::Fallback => {
                    warn!(error = %err, "primary failed, substituting fallback");
                    self.availability.mark_unavailable().await;
                    self.run_fallback(binding, args, "primary_failed").await
                }
                Disposition::Retry | Disposition::Propagate => {
                    debug!(error = %err, "primary failed, propagating");
                    Err(Error::Primary(err))
                }
            },
        }
    }

    async fn run_fallback(
        &self,
        binding: &OperationBinding,
        args: Value,
        reason: &'static str,
    ) -> Result<Dispatched> {
        metrics::counter!(
            "dispatch_fallback_total",
            "operation" => binding.name().to_string(),
            "reason" => reason
        )
        .increment(1);
        debug!(reason, "invoking fallback");

        match binding.fallback().invoke(args).await {
            Ok(value) => Ok(Dispatched {
                value,
                route: Route::Fallback,
            }),
            Err(err) => Err(Error::Fallback(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::HealthMonitor;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct Calls {
        primary: Arc<AtomicUsize>,
        fallback: Arc<AtomicUsize>,
    }

    impl Calls {
        fn primary(&self) -> usize {
            self.primary.load(Ordering::SeqCst)
        }

        fn fallback(&self) -> usize {
            self.fallback.load(Ordering::SeqCst)
        }
    }

    /// `listPosts` whose primary returns `primary_result`; the fallback
    /// echoes its arguments under `"local"`.
    fn list_posts(calls: &Calls, primary_result: transport::Result<Value>) -> OperationBinding {
        let (p, f) = (calls.primary.clone(), calls.fallback.clone());
        OperationBinding::new(
            "listPosts",
            move |_args: Value| {
                p.fetch_add(1, Ordering::SeqCst);
                let result = primary_result.clone();
                async move { result }
            },
            move |args: Value| {
                f.fetch_add(1, Ordering::SeqCst);
                async move { Ok::<_, transport::Error>(json!({"local": args})) }
            },
        )
    }

    async fn dispatcher(binding: OperationBinding, available: bool) -> Dispatcher {
        Dispatcher::new(
            [binding],
            Arc::new(Availability::with_initial(available)),
            false,
            FailurePolicy::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn primary_success_is_returned() {
        let calls = Calls::default();
        let d = dispatcher(list_posts(&calls, Ok(json!(["remote"]))), true).await;

        let out = d.dispatch("listPosts", json!({})).await.unwrap();
        assert_eq!(out.value, json!(["remote"]));
        assert_eq!(out.route, Route::Primary);
        assert_eq!((calls.primary(), calls.fallback()), (1, 0));
    }

    #[tokio::test]
    async fn network_failure_falls_back_and_downgrades() {
        let calls = Calls::default();
        let d = dispatcher(
            list_posts(&calls, Err(transport::Error::Network("refused".into()))),
            true,
        )
        .await;

        let value = d.call("listPosts", json!({"page": 1})).await.unwrap();
        assert_eq!(value, json!({"local": {"page": 1}}));
        assert_eq!((calls.primary(), calls.fallback()), (1, 1));
        assert!(!d.availability().is_available().await);

        // Now believed down: the next call skips the primary.
        d.call("listPosts", json!({})).await.unwrap();
        assert_eq!((calls.primary(), calls.fallback()), (1, 2));
    }

    #[tokio::test]
    async fn force_fallback_never_touches_primary() {
        let calls = Calls::default();
        let d = dispatcher(list_posts(&calls, Ok(json!([]))), true).await;
        d.set_force_fallback(true);

        for _ in 0..3 {
            let out = d.dispatch("listPosts", json!({})).await.unwrap();
            assert_eq!(out.route, Route::Fallback);
        }
        assert_eq!(calls.primary(), 0);

        d.set_force_fallback(false);
        assert_eq!(
            d.dispatch("listPosts", json!({})).await.unwrap().route,
            Route::Primary
        );
    }

    #[tokio::test]
    async fn validation_errors_bypass_fallback() {
        let calls = Calls::default();
        let err = transport::Error::from_status(400, r#"{"message":"caption is required"}"#);
        let d = dispatcher(list_posts(&calls, Err(err.clone())), true).await;

        assert_eq!(
            d.call("listPosts", json!({})).await.unwrap_err(),
            Error::Primary(err)
        );
        assert_eq!(calls.fallback(), 0);
        assert!(d.availability().is_available().await);
    }

    #[tokio::test]
    async fn auth_errors_propagate() {
        let calls = Calls::default();
        let d = dispatcher(list_posts(&calls, Err(transport::Error::LoggedOut)), true).await;

        assert_eq!(
            d.call("listPosts", json!({})).await.unwrap_err(),
            Error::Primary(transport::Error::LoggedOut)
        );
        assert_eq!(calls.fallback(), 0);
    }

    #[tokio::test]
    async fn server_errors_follow_policy() {
        let err = transport::Error::from_status(503, "maintenance");

        let calls = Calls::default();
        let d = dispatcher(list_posts(&calls, Err(err.clone())), true).await;
        assert_eq!(
            d.call("listPosts", json!({})).await.unwrap_err(),
            Error::Primary(err.clone())
        );

        let calls = Calls::default();
        let d = Dispatcher::new(
            [list_posts(&calls, Err(err))],
            Arc::new(Availability::with_initial(true)),
            false,
            FailurePolicy {
                server_errors_are_network: true,
            },
        )
        .unwrap();
        assert!(d.call("listPosts", json!({})).await.is_ok());
        assert_eq!(calls.fallback(), 1);
    }

    #[tokio::test]
    async fn failing_fallback_is_terminal() {
        let binding = OperationBinding::new(
            "getPost",
            |_args: Value| async { Err::<Value, _>(transport::Error::Network("down".into())) },
            |_args: Value| async { Err::<Value, _>(transport::Error::not_found("post")) },
        );
        let d = dispatcher(binding, true).await;

        let err = d.call("getPost", json!({"id": "9"})).await.unwrap_err();
        assert_eq!(err, Error::Fallback(transport::Error::not_found("post")));
        assert_eq!(err.operation_error().and_then(|e| e.status()), Some(404));
    }

    #[tokio::test]
    async fn unknown_and_duplicate_operations() {
        let calls = Calls::default();
        let d = dispatcher(list_posts(&calls, Ok(json!([]))), true).await;
        assert_eq!(
            d.call("nope", json!({})).await.unwrap_err(),
            Error::UnknownOperation("nope".into())
        );
        assert_eq!(d.operation_names(), vec!["listPosts"]);

        let dup = Dispatcher::new(
            [
                list_posts(&calls, Ok(json!([]))),
                list_posts(&calls, Ok(json!([]))),
            ],
            Arc::new(Availability::new()),
            false,
            FailurePolicy::default(),
        );
        assert_eq!(
            dup.err(),
            Some(Error::DuplicateOperation("listPosts".into()))
        );
    }

    #[tokio::test]
    async fn timed_out_checks_route_straight_to_fallback() {
        // Accepts connections but never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let calls = Calls::default();
        let d = dispatcher(list_posts(&calls, Ok(json!(["remote"]))), true).await;
        let monitor = HealthMonitor::new(
            reqwest::Client::new(),
            format!("http://{addr}/ping"),
            Duration::from_millis(100),
            d.availability().clone(),
        );

        assert!(!monitor.check().await);
        assert!(!monitor.check().await);

        let out = d.dispatch("listPosts", json!({})).await.unwrap();
        assert_eq!(out.route, Route::Fallback);
        assert_eq!(calls.primary(), 0);
    }
}
