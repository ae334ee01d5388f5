/// Errors from the typed client facade.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Dispatch(#[from] dispatch::Error),

    #[error("unexpected result shape: {0}")]
    Decode(String),
}

/// Result alias for the typed client facade.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// The failing operation's error, when there is one.
    pub fn operation_error(&self) -> Option<&transport::Error> {
        match self {
            Error::Dispatch(err) => err.operation_error(),
            Error::Decode(_) => None,
        }
    }

    /// True when the user has to log in again.
    pub fn is_login_required(&self) -> bool {
        matches!(
            self.operation_error(),
            Some(transport::Error::LoggedOut | transport::Error::Auth { .. })
        )
    }
}
