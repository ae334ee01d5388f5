//! Session credentials for the social client
//!
//! Holds the two opaque tokens (access + refresh) that authenticate calls to
//! the remote service, persists them across restarts, and talks to the remote
//! refresh endpoint. This crate has no knowledge of retries or concurrency;
//! the transport crate decides when a refresh happens.
//!
//! Credential flow:
//! 1. `login` succeeds → tokens stored via `CredentialStore::set()`
//! 2. Every outgoing call reads `CredentialStore::get()` for the bearer token
//! 3. On a 401 the refresh coordinator calls `token::refresh_session()`
//! 4. New pair saved via `set()`, or `clear()` on failure (hard logout)

pub mod constants;
pub mod credentials;
pub mod error;
pub mod token;

pub use constants::*;
pub use credentials::{CredentialStore, Session};
pub use error::{Error, Result};
pub use token::{TokenPair, refresh_session};
