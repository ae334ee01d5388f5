//! Runtime override surface
//!
//! Endpoints:
//! - GET /admin/force-fallback  current flag
//! - PUT /admin/force-fallback  `{"enabled": bool}`; takes effect on the next call

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use dispatch::Dispatcher;
use serde::Deserialize;
use tracing::info;

/// Shared state for admin handlers.
#[derive(Clone)]
pub struct AdminState {
    dispatcher: Arc<Dispatcher>,
}

impl AdminState {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }
}

#[derive(Debug, Deserialize)]
struct ForceFallbackRequest {
    enabled: bool,
}

pub fn build_admin_router(state: AdminState) -> Router {
    Router::new()
        .route(
            "/admin/force-fallback",
            get(get_force_fallback).put(put_force_fallback),
        )
        .with_state(state)
}

async fn get_force_fallback(State(state): State<AdminState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({ "enabled": state.dispatcher.force_fallback() })),
    )
}

async fn put_force_fallback(
    State(state): State<AdminState>,
    Json(request): Json<ForceFallbackRequest>,
) -> impl IntoResponse {
    state.dispatcher.set_force_fallback(request.enabled);
    info!(enabled = request.enabled, "force-fallback set via admin API");
    (
        StatusCode::OK,
        Json(serde_json::json!({ "enabled": request.enabled })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use dispatch::{Availability, OperationBinding};
    use serde_json::{Value, json};
    use tower::ServiceExt;
    use transport::FailurePolicy;

    fn test_dispatcher(force: bool) -> Arc<Dispatcher> {
        let binding = OperationBinding::new(
            "ping",
            |_args: Value| async { Ok::<_, transport::Error>(json!("remote")) },
            |_args: Value| async { Ok::<_, transport::Error>(json!("local")) },
        );
        Arc::new(
            Dispatcher::new(
                [binding],
                Arc::new(Availability::with_initial(true)),
                force,
                FailurePolicy::default(),
            )
            .unwrap(),
        )
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn get_reports_current_flag() {
        let app = build_admin_router(AdminState::new(test_dispatcher(true)));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/admin/force-fallback")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["enabled"], true);
    }

    #[tokio::test]
    async fn put_toggles_routing_for_next_call() {
        let dispatcher = test_dispatcher(false);
        assert_eq!(dispatcher.call("ping", Value::Null).await.unwrap(), "remote");

        let app = build_admin_router(AdminState::new(dispatcher.clone()));
        let response = app
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/admin/force-fallback")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"enabled":true}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(dispatcher.force_fallback());
        assert_eq!(dispatcher.call("ping", Value::Null).await.unwrap(), "local");
    }

    #[tokio::test]
    async fn put_rejects_malformed_body() {
        let dispatcher = test_dispatcher(false);
        let app = build_admin_router(AdminState::new(dispatcher.clone()));
        let response = app
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/admin/force-fallback")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"enabled":"yes"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.status().is_client_error());
        assert!(!dispatcher.force_fallback());
    }
}
