//! Credential storage for the access/refresh token pair
//!
//! The session lives in memory behind a tokio Mutex and is mirrored to a JSON
//! file with two slots (`token`, `refreshToken`). All writes use atomic
//! temp-file + rename so a crash mid-write never leaves a half-written file.
//!
//! Storage problems never surface to callers: an unreadable or corrupt file
//! loads as the empty session, and a failed write is logged while the
//! in-memory state still changes.

use std::path::{Path, PathBuf};

use common::Secret;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::token::TokenPair;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Tokens {
    access: Secret<String>,
    refresh: Secret<String>,
}

/// The current credentials: both tokens or neither.
///
/// There is no way to construct a session holding only one of the two
/// tokens; an empty string for either one yields the empty session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    tokens: Option<Tokens>,
}

impl Session {
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        let access = access.into();
        let refresh = refresh.into();
        if access.is_empty() || refresh.is_empty() {
            return Self::empty();
        }
        Self {
            tokens: Some(Tokens {
                access: Secret::new(access),
                refresh: Secret::new(refresh),
            }),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn access_token(&self) -> Option<&str> {
        self.tokens.as_ref().map(|t| t.access.expose().as_str())
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.tokens.as_ref().map(|t| t.refresh.expose().as_str())
    }

    pub fn is_authenticated(&self) -> bool {
        self.tokens.is_some()
    }
}

impl From<TokenPair> for Session {
    fn from(pair: TokenPair) -> Self {
        Session::new(pair.token, pair.refresh_token)
    }
}

/// On-disk layout. Slots are optional so a partially written or hand-edited
/// file still parses; `Session::new` then enforces the both-or-neither rule.
/// Field names must match `ACCESS_TOKEN_KEY` and `REFRESH_TOKEN_KEY`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredSession {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token: Option<String>,
    #[serde(
        rename = "refreshToken",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    refresh_token: Option<String>,
}

impl StoredSession {
    fn from_session(session: &Session) -> Self {
        Self {
            token: session.access_token().map(str::to_owned),
            refresh_token: session.refresh_token().map(str::to_owned),
        }
    }

    fn into_session(self) -> Session {
        match (self.token, self.refresh_token) {
            (Some(access), Some(refresh)) => Session::new(access, refresh),
            (None, None) => Session::empty(),
            _ => {
                warn!("session file holds only one token, treating as logged out");
                Session::empty()
            }
        }
    }
}

/// Persisted get/set/clear surface for the session.
///
/// `path` is `None` for a purely in-memory store (tests, ephemeral clients).
pub struct CredentialStore {
    path: Option<PathBuf>,
    state: Mutex<Session>,
}

impl CredentialStore {
    /// Load the session from `path`.
    ///
    /// A missing file is a cold start (empty session). A file that cannot be
    /// read or parsed is also treated as empty; the next write replaces it.
    pub async fn load(path: PathBuf) -> Self {
        let session = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => match serde_json::from_str::<StoredSession>(&contents) {
                Ok(stored) => {
                    let session = stored.into_session();
                    info!(
                        path = %path.display(),
                        authenticated = session.is_authenticated(),
                        "loaded session"
                    );
                    session
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "session file unreadable, starting logged out");
                    Session::empty()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "session file not found, starting logged out");
                Session::empty()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "session storage unavailable, starting logged out");
                Session::empty()
            }
        };

        Self {
            path: Some(path),
            state: Mutex::new(session),
        }
    }

    /// A store that never touches disk.
    pub fn in_memory(session: Session) -> Self {
        Self {
            path: None,
            state: Mutex::new(session),
        }
    }

    /// Snapshot of the current session.
    pub async fn get(&self) -> Session {
        self.state.lock().await.clone()
    }

    /// Replace both tokens and persist.
    pub async fn set(&self, session: Session) {
        let mut state = self.state.lock().await;
        *state = session;
        debug!(authenticated = state.is_authenticated(), "session updated");
        self.persist(&state).await;
    }

    /// Drop both tokens and persist.
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        *state = Session::empty();
        debug!("session cleared");
        self.persist(&state).await;
    }

    async fn persist(&self, session: &Session) {
        let Some(path) = &self.path else {
            return;
        };
        if let Err(e) = write_atomic(path, &StoredSession::from_session(session)).await {
            warn!(path = %path.display(), error = %e, "failed to persist session");
        }
    }
}

/// Write the session file atomically with 0600 permissions on unix.
async fn write_atomic(path: &Path, data: &StoredSession) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(data).map_err(std::io::Error::other)?;

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let tmp_path = dir.join(format!(".session.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes()).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600)).await?;
    }

    tokio::fs::rename(&tmp_path, path).await?;
    debug!(path = %path.display(), "persisted session");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_requires_both_tokens() {
        assert!(Session::new("A1", "R1").is_authenticated());
        assert!(!Session::new("A1", "").is_authenticated());
        assert!(!Session::new("", "R1").is_authenticated());
        assert_eq!(Session::new("", "R1"), Session::empty());
    }

    #[test]
    fn session_debug_hides_tokens() {
        let debug = format!("{:?}", Session::new("A1-secret", "R1-secret"));
        assert!(!debug.contains("A1-secret"));
        assert!(!debug.contains("R1-secret"));
    }

    #[tokio::test]
    async fn set_then_reload_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let store = CredentialStore::load(path.clone()).await;
        assert!(!store.get().await.is_authenticated());
        store.set(Session::new("A1", "R1")).await;

        let reloaded = CredentialStore::load(path).await;
        let session = reloaded.get().await;
        assert_eq!(session.access_token(), Some("A1"));
        assert_eq!(session.refresh_token(), Some("R1"));
    }

    #[tokio::test]
    async fn file_uses_named_slots() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let store = CredentialStore::load(path.clone()).await;
        store.set(Session::new("A1", "R1")).await;

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(json[crate::ACCESS_TOKEN_KEY], "A1");
        assert_eq!(json[crate::REFRESH_TOKEN_KEY], "R1");
    }

    #[tokio::test]
    async fn loads_file_keyed_by_slot_constants() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let contents = serde_json::json!({
            (crate::ACCESS_TOKEN_KEY): "A9",
            (crate::REFRESH_TOKEN_KEY): "R9",
        });
        tokio::fs::write(&path, contents.to_string()).await.unwrap();

        let session = CredentialStore::load(path).await.get().await;
        assert_eq!(session.access_token(), Some("A9"));
        assert_eq!(session.refresh_token(), Some("R9"));
    }

    #[tokio::test]
    async fn clear_removes_both_slots() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let store = CredentialStore::load(path.clone()).await;
        store.set(Session::new("A1", "R1")).await;
        store.clear().await;

        assert_eq!(store.get().await, Session::empty());
        let reloaded = CredentialStore::load(path).await;
        assert!(!reloaded.get().await.is_authenticated());
    }

    #[tokio::test]
    async fn corrupt_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        tokio::fs::write(&path, "not json {{").await.unwrap();

        let store = CredentialStore::load(path).await;
        assert!(!store.get().await.is_authenticated());
    }

    #[tokio::test]
    async fn half_session_on_disk_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        tokio::fs::write(&path, r#"{"token":"A1"}"#).await.unwrap();

        let store = CredentialStore::load(path).await;
        assert_eq!(store.get().await, Session::empty());
    }

    #[tokio::test]
    async fn unwritable_location_still_updates_memory() {
        let store =
            CredentialStore::load(PathBuf::from("/nonexistent/dir/session.json")).await;
        store.set(Session::new("A1", "R1")).await;
        assert_eq!(store.get().await.access_token(), Some("A1"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn file_permissions_are_0600() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let store = CredentialStore::load(path.clone()).await;
        store.set(Session::new("A1", "R1")).await;

        let mode = tokio::fs::metadata(&path).await.unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600, "session file must be 0600, got {mode:o}");
    }

    #[tokio::test]
    async fn in_memory_store_never_writes() {
        let store = CredentialStore::in_memory(Session::new("A1", "R1"));
        store.clear().await;
        assert!(!store.get().await.is_authenticated());
    }
}
