//! Failure taxonomy for remote calls
//!
//! Every failure the core can observe maps to exactly one `ErrorClass`. The
//! class, not the concrete variant, drives retry and fallback decisions.

/// Errors from a remote (or locally substituted) operation.
///
/// `Clone` because one refresh outcome is delivered to every waiter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// No response reached us: connect failure, DNS, timeout, broken body
    #[error("network error: {0}")]
    Network(String),

    /// 401 from the service, or a rejected refresh token
    #[error("authentication failed ({status}): {message}")]
    Auth { status: u16, message: String },

    /// Any other 4xx, including not-found
    #[error("request rejected ({status}): {message}")]
    Validation { status: u16, message: String },

    /// The request could not be built from the supplied arguments
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// No credentials left to refresh with; the user must log in again
    #[error("session ended, login required")]
    LoggedOut,

    #[error("invalid response body: {0}")]
    Decode(String),
}

/// Result alias for transport operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification consumed by `policy::classify`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Network,
    Auth,
    Validation,
    Server,
    Session,
    Decode,
}

impl Error {
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::Network(_) => ErrorClass::Network,
            Error::Auth { .. } => ErrorClass::Auth,
            Error::Validation { .. } | Error::InvalidRequest(_) => ErrorClass::Validation,
            Error::Server { .. } => ErrorClass::Server,
            Error::LoggedOut => ErrorClass::Session,
            Error::Decode(_) => ErrorClass::Decode,
        }
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Auth { status, .. }
            | Error::Validation { status, .. }
            | Error::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Map a non-2xx response to the taxonomy.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = error_message(body);
        match status {
            401 => Error::Auth { status, message },
            500..=599 => Error::Server { status, message },
            _ => Error::Validation { status, message },
        }
    }

    pub fn not_found(what: &str) -> Self {
        Error::Validation {
            status: 404,
            message: format!("{what} not found"),
        }
    }
}

impl From<session::Error> for Error {
    fn from(err: session::Error) -> Self {
        match err {
            session::Error::Http(msg) => Error::Network(msg),
            session::Error::Rejected { status: 403, body } => Error::Auth {
                status: 403,
                message: error_message(&body),
            },
            session::Error::Rejected { status, body } => Error::from_status(status, &body),
            session::Error::InvalidResponse(msg) => Error::Decode(msg),
        }
    }
}

/// Pull a human-readable message out of an error body.
///
/// Prefers a JSON `message` field, then `error`, then the raw text.
fn error_message(body: &str) -> String {
    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["message", "error"] {
            if let Some(serde_json::Value::String(msg)) = map.get(key) {
                return msg.clone();
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        String::from("<no body>")
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(Error::from_status(401, "").class(), ErrorClass::Auth);
        assert_eq!(Error::from_status(400, "").class(), ErrorClass::Validation);
        assert_eq!(Error::from_status(403, "").class(), ErrorClass::Validation);
        assert_eq!(Error::from_status(404, "").class(), ErrorClass::Validation);
        assert_eq!(Error::from_status(500, "").class(), ErrorClass::Server);
        assert_eq!(Error::from_status(503, "").class(), ErrorClass::Server);
    }

    #[test]
    fn message_prefers_json_fields() {
        let err = Error::from_status(400, r#"{"message":"caption is required"}"#);
        assert_eq!(
            err,
            Error::Validation {
                status: 400,
                message: "caption is required".into()
            }
        );

        let err = Error::from_status(500, r#"{"error":"db down"}"#);
        assert_eq!(err.to_string(), "server error (500): db down");

        let err = Error::from_status(502, "  bad gateway \n");
        assert_eq!(err.to_string(), "server error (502): bad gateway");
    }

    #[test]
    fn refresh_errors_map_to_taxonomy() {
        let err: Error = session::Error::Http("connection refused".into()).into();
        assert_eq!(err.class(), ErrorClass::Network);

        let err: Error = session::Error::Rejected {
            status: 403,
            body: "revoked".into(),
        }
        .into();
        assert_eq!(err.class(), ErrorClass::Auth);

        let err: Error = session::Error::Rejected {
            status: 401,
            body: "expired".into(),
        }
        .into();
        assert_eq!(err.class(), ErrorClass::Auth);

        let err: Error = session::Error::InvalidResponse("eof".into()).into();
        assert_eq!(err.class(), ErrorClass::Decode);
    }

    #[test]
    fn not_found_is_validation_404() {
        let err = Error::not_found("post");
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.to_string(), "request rejected (404): post not found");
    }
}
