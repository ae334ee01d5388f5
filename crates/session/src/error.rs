//! Error types for session operations

/// Errors from talking to the refresh endpoint.
///
/// The credential store itself never fails: unreadable storage is treated as
/// an empty session and write failures are logged.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// No response reached us (connect failure, DNS, timeout)
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The endpoint answered with a non-2xx status
    #[error("refresh rejected ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("invalid token response: {0}")]
    InvalidResponse(String),
}

/// Result alias for session operations.
pub type Result<T> = std::result::Result<T, Error>;
