/// Errors surfaced by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    #[error("operation bound twice: {0}")]
    DuplicateOperation(String),

    /// The primary failed with an error that is not eligible for fallback
    #[error(transparent)]
    Primary(transport::Error),

    /// The fallback itself failed; terminal
    #[error("fallback failed: {0}")]
    Fallback(transport::Error),
}

/// Result alias for dispatch operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// The underlying operation error, if the failure came from an
    /// implementation rather than the lookup.
    pub fn operation_error(&self) -> Option<&transport::Error> {
        match self {
            Error::Primary(err) | Error::Fallback(err) => Some(err),
            Error::UnknownOperation(_) | Error::DuplicateOperation(_) => None,
        }
    }
}
