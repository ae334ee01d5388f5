//! Social network operations with transparent local fallback
//!
//! Defines the operation catalog (auth, users, posts, comments, likes,
//! communities, notifications), a primary implementation that calls the
//! remote REST service, a fallback that serves the same shapes from a
//! seeded in-memory dataset, and `SocialClient`, a typed facade over the
//! dispatcher that routes between them.

pub mod backend;
pub mod catalog;
pub mod client;
pub mod error;
pub mod local;
pub mod models;
pub mod remote;

pub use backend::{Op, SocialBackend};
pub use client::SocialClient;
pub use error::{Error, Result};
pub use local::LocalApi;
pub use remote::RemoteApi;
