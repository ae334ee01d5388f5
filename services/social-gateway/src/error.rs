//! HTTP mapping for operation failures
//!
//! Every error leaves the gateway as
//! `{"error":{"type":"...","message":"...","request_id":"req_..."}}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// An operation failure ready to be rendered as a JSON error response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub kind: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_request", message)
    }

    pub fn into_response(self, request_id: &str) -> Response {
        let body = serde_json::json!({
            "error": {
                "type": self.kind,
                "message": self.message,
                "request_id": request_id,
            }
        });
        (
            self.status,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body.to_string(),
        )
            .into_response()
    }
}

impl From<&dispatch::Error> for ApiError {
    fn from(err: &dispatch::Error) -> Self {
        match err {
            dispatch::Error::UnknownOperation(_) => {
                Self::new(StatusCode::NOT_FOUND, "unknown_operation", err.to_string())
            }
            dispatch::Error::DuplicateOperation(_) => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                err.to_string(),
            ),
            dispatch::Error::Primary(inner) => from_operation(inner, false),
            dispatch::Error::Fallback(inner) => from_operation(inner, true),
        }
    }
}

/// Business outcomes keep their meaning on either route. Infrastructure
/// failures of the local fallback surface as `fallback_error`.
fn from_operation(err: &transport::Error, fallback: bool) -> ApiError {
    let message = err.to_string();
    match err {
        transport::Error::LoggedOut | transport::Error::Auth { .. } => {
            ApiError::new(StatusCode::UNAUTHORIZED, "login_required", message)
        }
        transport::Error::Validation { status, .. } => ApiError::new(
            StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_REQUEST),
            "validation_error",
            message,
        ),
        transport::Error::InvalidRequest(_) => ApiError::invalid_request(message),
        _ if fallback => ApiError::new(StatusCode::BAD_GATEWAY, "fallback_error", message),
        transport::Error::Server { .. } => {
            ApiError::new(StatusCode::BAD_GATEWAY, "upstream_error", message)
        }
        transport::Error::Network(_) => {
            ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "unavailable", message)
        }
        transport::Error::Decode(_) => {
            ApiError::new(StatusCode::BAD_GATEWAY, "decode_error", message)
        }
    }
}
