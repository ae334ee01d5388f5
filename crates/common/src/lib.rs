//! Shared types for the social client workspace
//!
//! `Secret` keeps bearer and refresh tokens out of logs; `Error` covers
//! configuration loading for the gateway binary.

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
