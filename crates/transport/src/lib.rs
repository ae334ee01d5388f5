//! Authenticated remote calls with single-flight credential refresh
//!
//! `Transport` performs every call to the remote service: it attaches the
//! stored bearer token, applies a fixed timeout, and on a first 401 asks the
//! `RefreshCoordinator` for a fresh token and replays the request once.
//!
//! Call lifecycle:
//! 1. Read the session, attach `Authorization: Bearer <access>`
//! 2. Send; 2xx → decoded JSON body
//! 3. Failure → `policy::classify()` picks Retry / Fallback / Propagate
//! 4. Retry (first 401 only) → `RefreshCoordinator::obtain_fresh_token()`
//!    → replay with the new token
//! 5. Refresh failure → credentials cleared, `HardLogout` broadcast, error
//!    returned to every caller waiting on that refresh

pub mod client;
pub mod error;
pub mod policy;
pub mod refresh;
pub mod request;

#[cfg(test)]
mod testing;

pub use client::Transport;
pub use error::{Error, ErrorClass, Result};
pub use policy::{Disposition, FailurePolicy, classify};
pub use refresh::{HardLogout, RefreshCoordinator};
pub use request::ApiRequest;
