//! In-process mock of the remote API for transport tests.
//!
//! Accepts `Bearer A2` as the only valid access token and renews `R1`-style
//! refresh tokens to the `A2`/`R2` pair.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tokio::sync::Barrier;

#[derive(Default)]
struct MockState {
    refresh_calls: AtomicUsize,
    authorized_calls: AtomicUsize,
    rejected_calls: AtomicUsize,
    fail_refresh: AtomicBool,
    refresh_delay_ms: AtomicU64,
    rejection_barrier: Mutex<Option<Arc<Barrier>>>,
}

#[derive(Clone)]
pub(crate) struct MockApi {
    addr: std::net::SocketAddr,
    state: Arc<MockState>,
}

impl MockApi {
    pub(crate) async fn start() -> Self {
        let state = Arc::new(MockState::default());
        state.refresh_delay_ms.store(50, Ordering::SeqCst);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = axum::Router::new()
            .route("/auth/refresh", post(refresh))
            .route("/posts", get(list_posts).post(create_post))
            .route("/always-unauthorized", get(always_unauthorized))
            .route("/broken", get(broken))
            .route("/slow", get(slow))
            .route("/echo-query", get(echo_query))
            .route("/posts/1", axum::routing::delete(delete_post))
            .with_state(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub(crate) fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub(crate) fn refresh_url(&self) -> String {
        format!("http://{}/auth/refresh", self.addr)
    }

    pub(crate) fn refresh_calls(&self) -> usize {
        self.state.refresh_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn authorized_calls(&self) -> usize {
        self.state.authorized_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn rejected_calls(&self) -> usize {
        self.state.rejected_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn fail_refresh(&self) {
        self.state.fail_refresh.store(true, Ordering::SeqCst);
    }

    pub(crate) fn set_refresh_delay(&self, delay: Duration) {
        self.state
            .refresh_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Hold every 401 for `/posts` until `n` requests have been rejected.
    pub(crate) fn hold_rejections_until(&self, n: usize) {
        *self.state.rejection_barrier.lock().unwrap() = Some(Arc::new(Barrier::new(n)));
    }
}

async fn refresh(State(state): State<Arc<MockState>>) -> Response {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);
    let delay = state.refresh_delay_ms.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(delay)).await;

    if state.fail_refresh.load(Ordering::SeqCst) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"message": "refresh token expired"})),
        )
            .into_response();
    }
    Json(serde_json::json!({"token": "A2", "refreshToken": "R2"})).into_response()
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

async fn list_posts(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if bearer(&headers) == Some("A2") {
        state.authorized_calls.fetch_add(1, Ordering::SeqCst);
        return Json(serde_json::json!([{"id": "1", "caption": "hello"}])).into_response();
    }

    state.rejected_calls.fetch_add(1, Ordering::SeqCst);
    let barrier = state.rejection_barrier.lock().unwrap().clone();
    if let Some(barrier) = barrier {
        barrier.wait().await;
    }
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({"message": "token expired"})),
    )
        .into_response()
}

async fn create_post() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({"message": "caption is required"})),
    )
        .into_response()
}

async fn always_unauthorized(State(state): State<Arc<MockState>>) -> Response {
    state.rejected_calls.fetch_add(1, Ordering::SeqCst);
    (StatusCode::UNAUTHORIZED, "nope").into_response()
}

async fn broken() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "database unavailable").into_response()
}

async fn slow() -> Response {
    tokio::time::sleep(Duration::from_secs(2)).await;
    Json(serde_json::json!({"late": true})).into_response()
}

async fn echo_query(uri: Uri) -> Response {
    Json(serde_json::json!({"query": uri.query().unwrap_or("")})).into_response()
}

async fn delete_post() -> Response {
    StatusCode::NO_CONTENT.into_response()
}
