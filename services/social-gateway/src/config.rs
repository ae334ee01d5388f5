//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! Only `[remote]` is required; every other section falls back to defaults.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use transport::FailurePolicy;

/// Env var that overrides `dispatch.force_fallback` at load time
pub const FORCE_FALLBACK_ENV: &str = "SOCIAL_FORCE_FALLBACK";

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewayConfig,
    pub remote: RemoteConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

/// Local HTTP surface
#[derive(Debug, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// Remote social service
#[derive(Debug, Deserialize)]
pub struct RemoteConfig {
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,
}

/// Liveness check against the remote service
#[derive(Debug, Deserialize)]
pub struct HealthConfig {
    #[serde(default = "default_health_path")]
    pub path: String,
    #[serde(default = "default_check_timeout")]
    pub timeout_ms: u64,
    #[serde(default = "default_check_interval")]
    pub interval_secs: u64,
}

#[derive(Debug, Default, Deserialize)]
pub struct DispatchConfig {
    #[serde(default)]
    pub force_fallback: bool,
    /// Let 5xx responses trigger the local fallback like network failures
    #[serde(default)]
    pub server_errors_are_network: bool,
}

#[derive(Debug, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_credentials_path")]
    pub credentials_path: PathBuf,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 7070))
}

fn default_max_connections() -> usize {
    256
}

fn default_timeout() -> u64 {
    10
}

fn default_refresh_path() -> String {
    session::DEFAULT_REFRESH_PATH.to_string()
}

fn default_health_path() -> String {
    "/ping".to_string()
}

fn default_check_timeout() -> u64 {
    2000
}

fn default_check_interval() -> u64 {
    30
}

fn default_credentials_path() -> PathBuf {
    PathBuf::from(session::DEFAULT_CREDENTIALS_FILE)
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            max_connections: default_max_connections(),
        }
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            path: default_health_path(),
            timeout_ms: default_check_timeout(),
            interval_secs: default_check_interval(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            credentials_path: default_credentials_path(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if !config.remote.base_url.starts_with("http://")
            && !config.remote.base_url.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "base_url must start with http:// or https://, got: {}",
                config.remote.base_url
            )));
        }

        if config.remote.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if config.health.timeout_ms == 0 {
            return Err(common::Error::Config(
                "health.timeout_ms must be greater than 0".into(),
            ));
        }

        if config.health.interval_secs == 0 {
            return Err(common::Error::Config(
                "health.interval_secs must be greater than 0".into(),
            ));
        }

        if config.gateway.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        for (name, value) in [
            ("refresh_path", &config.remote.refresh_path),
            ("health.path", &config.health.path),
        ] {
            if !value.starts_with('/') {
                return Err(common::Error::Config(format!(
                    "{name} must start with '/', got: {value}"
                )));
            }
        }

        if let Ok(raw) = std::env::var(FORCE_FALLBACK_ENV) {
            config.dispatch.force_fallback = parse_flag(&raw).ok_or_else(|| {
                common::Error::Config(format!(
                    "{FORCE_FALLBACK_ENV} must be one of 1, true, 0, false; got: {raw}"
                ))
            })?;
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("social-gateway.toml")
    }

    pub fn refresh_url(&self) -> String {
        join_url(&self.remote.base_url, &self.remote.refresh_path)
    }

    pub fn health_url(&self) -> String {
        join_url(&self.remote.base_url, &self.health.path)
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_secs(self.remote.timeout_secs)
    }

    pub fn check_timeout(&self) -> Duration {
        Duration::from_millis(self.health.timeout_ms)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.health.interval_secs)
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        FailurePolicy {
            server_errors_are_network: self.dispatch.server_errors_are_network,
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" => Some(true),
        "0" | "false" => Some(false),
        _ => None,
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Mutex to serialize tests that mutate environment variables, preventing
    /// data races when tests run in parallel.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    fn write_config(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("social-gateway.toml");
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn minimal_toml() -> &'static str {
        r#"
[remote]
base_url = "http://localhost:8080/api/"
"#
    }

    #[test]
    fn test_minimal_config_takes_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env(FORCE_FALLBACK_ENV) };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, minimal_toml());

        let config = Config::load(&path).unwrap();
        assert_eq!(config.gateway.listen_addr, default_listen_addr());
        assert_eq!(config.remote.timeout_secs, 10);
        assert_eq!(config.health.timeout_ms, 2000);
        assert_eq!(config.health.interval_secs, 30);
        assert!(!config.dispatch.force_fallback);
        assert_eq!(config.failure_policy(), FailurePolicy::default());
        assert_eq!(config.session.credentials_path, PathBuf::from("session.json"));
        assert_eq!(config.refresh_url(), "http://localhost:8080/api/auth/refresh");
        assert_eq!(config.health_url(), "http://localhost:8080/api/ping");
    }

    #[test]
    fn test_full_config() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env(FORCE_FALLBACK_ENV) };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
[gateway]
listen_addr = "0.0.0.0:9000"
max_connections = 8

[remote]
base_url = "https://social.example.com"
timeout_secs = 3
refresh_path = "/v2/refresh"

[health]
path = "/healthz"
timeout_ms = 500
interval_secs = 5

[dispatch]
force_fallback = true
server_errors_are_network = true

[session]
credentials_path = "/var/lib/social/session.json"
"#,
        );

        let config = Config::load(&path).unwrap();
        assert_eq!(config.gateway.listen_addr.port(), 9000);
        assert_eq!(config.gateway.max_connections, 8);
        assert_eq!(config.remote_timeout(), Duration::from_secs(3));
        assert_eq!(config.check_timeout(), Duration::from_millis(500));
        assert_eq!(config.check_interval(), Duration::from_secs(5));
        assert!(config.dispatch.force_fallback);
        assert!(config.failure_policy().server_errors_are_network);
        assert_eq!(config.refresh_url(), "https://social.example.com/v2/refresh");
        assert_eq!(config.health_url(), "https://social.example.com/healthz");
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load(Path::new("/nonexistent/path/config.toml"));
        assert!(matches!(result, Err(common::Error::Io(_))));
    }

    #[test]
    fn test_load_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "not valid {{{{ toml");
        assert!(matches!(Config::load(&path), Err(common::Error::Toml(_))));
    }

    #[test]
    fn test_missing_remote_section_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[gateway]\nlisten_addr = \"127.0.0.1:7070\"\n");
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env(FORCE_FALLBACK_ENV) };
        let dir = tempfile::tempdir().unwrap();
        let cases = [
            ("[remote]\nbase_url = \"ftp://example.com\"\n", "base_url"),
            (
                "[remote]\nbase_url = \"http://x\"\ntimeout_secs = 0\n",
                "timeout_secs",
            ),
            (
                "[remote]\nbase_url = \"http://x\"\n[health]\ntimeout_ms = 0\n",
                "timeout_ms",
            ),
            (
                "[remote]\nbase_url = \"http://x\"\n[health]\ninterval_secs = 0\n",
                "interval_secs",
            ),
            (
                "[remote]\nbase_url = \"http://x\"\nrefresh_path = \"auth/refresh\"\n",
                "refresh_path",
            ),
        ];
        for (toml_content, field) in cases {
            let path = write_config(&dir, toml_content);
            match Config::load(&path) {
                Err(common::Error::Config(msg)) => {
                    assert!(msg.contains(field), "expected {field} in: {msg}")
                }
                other => panic!("expected config error for {field}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_force_fallback_env_override() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, minimal_toml());

        unsafe { set_env(FORCE_FALLBACK_ENV, "1") };
        assert!(Config::load(&path).unwrap().dispatch.force_fallback);

        let path = write_config(
            &dir,
            "[remote]\nbase_url = \"http://x\"\n[dispatch]\nforce_fallback = true\n",
        );
        unsafe { set_env(FORCE_FALLBACK_ENV, "false") };
        assert!(!Config::load(&path).unwrap().dispatch.force_fallback);

        unsafe { set_env(FORCE_FALLBACK_ENV, "maybe") };
        assert!(matches!(
            Config::load(&path),
            Err(common::Error::Config(_))
        ));
        unsafe { remove_env(FORCE_FALLBACK_ENV) };
    }

    #[test]
    fn test_resolve_path_cli_arg() {
        let path = Config::resolve_path(Some("/custom/path.toml"));
        assert_eq!(path, PathBuf::from("/custom/path.toml"));
    }

    #[test]
    fn test_resolve_path_env_var() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("CONFIG_PATH", "/env/path.toml") };
        let path = Config::resolve_path(None);
        assert_eq!(path, PathBuf::from("/env/path.toml"));
        unsafe { remove_env("CONFIG_PATH") };
    }

    #[test]
    fn test_resolve_path_default() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("CONFIG_PATH") };
        let path = Config::resolve_path(None);
        assert_eq!(path, PathBuf::from("social-gateway.toml"));
    }

    #[test]
    fn test_resolve_path_cli_overrides_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("CONFIG_PATH", "/env/should-lose.toml") };
        let path = Config::resolve_path(Some("/cli/wins.toml"));
        assert_eq!(path, PathBuf::from("/cli/wins.toml"));
        unsafe { remove_env("CONFIG_PATH") };
    }
}
