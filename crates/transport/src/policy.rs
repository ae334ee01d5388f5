//! Failure disposition policy
//!
//! One decision function shared by the transport's retry loop and the
//! dispatcher's fallback logic:
//! - first 401 on a request → Retry (refresh credentials, replay once)
//! - network-class failure → Fallback (switch to the local implementation)
//! - everything else → Propagate unchanged

use crate::error::{Error, ErrorClass};

/// What the caller should do with a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Retry,
    Fallback,
    Propagate,
}

/// Tunables for `classify`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FailurePolicy {
    /// Treat 5xx responses like unreachable-service failures
    pub server_errors_are_network: bool,
}

/// Decide how to handle `error`.
///
/// `retried` is true once the request has already been replayed after a
/// refresh; a second 401 is then propagated instead of refreshing again.
pub fn classify(error: &Error, retried: bool, policy: FailurePolicy) -> Disposition {
    match error.class() {
        ErrorClass::Auth if !retried => Disposition::Retry,
        ErrorClass::Network => Disposition::Fallback,
        ErrorClass::Server if policy.server_errors_are_network => Disposition::Fallback,
        ErrorClass::Auth
        | ErrorClass::Validation
        | ErrorClass::Server
        | ErrorClass::Session
        | ErrorClass::Decode => Disposition::Propagate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth() -> Error {
        Error::Auth {
            status: 401,
            message: "expired".into(),
        }
    }

    fn server() -> Error {
        Error::Server {
            status: 503,
            message: "maintenance".into(),
        }
    }

    #[test]
    fn first_401_retries() {
        assert_eq!(
            classify(&auth(), false, FailurePolicy::default()),
            Disposition::Retry
        );
    }

    #[test]
    fn second_401_propagates() {
        assert_eq!(
            classify(&auth(), true, FailurePolicy::default()),
            Disposition::Propagate
        );
    }

    #[test]
    fn network_falls_back_regardless_of_retry_state() {
        let err = Error::Network("timed out".into());
        assert_eq!(
            classify(&err, false, FailurePolicy::default()),
            Disposition::Fallback
        );
        assert_eq!(
            classify(&err, true, FailurePolicy::default()),
            Disposition::Fallback
        );
    }

    #[test]
    fn validation_never_falls_back() {
        let err = Error::from_status(400, "bad input");
        assert_eq!(
            classify(&err, false, FailurePolicy::default()),
            Disposition::Propagate
        );
        assert_eq!(
            classify(&Error::not_found("post"), false, FailurePolicy::default()),
            Disposition::Propagate
        );
    }

    #[test]
    fn server_errors_propagate_by_default() {
        assert_eq!(
            classify(&server(), false, FailurePolicy::default()),
            Disposition::Propagate
        );
    }

    #[test]
    fn server_errors_fall_back_when_configured() {
        let policy = FailurePolicy {
            server_errors_are_network: true,
        };
        assert_eq!(classify(&server(), false, policy), Disposition::Fallback);
    }

    #[test]
    fn logged_out_propagates() {
        assert_eq!(
            classify(&Error::LoggedOut, false, FailurePolicy::default()),
            Disposition::Propagate
        );
    }
}
