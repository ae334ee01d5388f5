//! Storage slot names and endpoint defaults
//!
//! The slot names match what the web client historically kept in browser
//! storage, so a session file can be inspected side by side with it.

/// Persisted slot holding the bearer access token.
///
/// `StoredSession` spells both slot names as serde attributes; keep them in
/// step with these constants.
pub const ACCESS_TOKEN_KEY: &str = "token";

/// Persisted slot holding the refresh token
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// Refresh endpoint path, relative to the API base URL
pub const DEFAULT_REFRESH_PATH: &str = "/auth/refresh";

/// Default session file name when none is configured
pub const DEFAULT_CREDENTIALS_FILE: &str = "session.json";
