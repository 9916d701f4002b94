//! Client configuration.
//!
//! [`ClientConfig`] holds the backend address, the reconnect policy, and the
//! display timers.  Defaults match the backend's stock deployment; values can
//! be overridden from the `[client]` table of `config/default.toml`, from the
//! environment (`XHS_BASE_URL`, `XHS_LOG_LEVEL`, optionally via `.env`), and
//! finally by command-line flags through the `with_*` setters.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, warn};
use url::Url;

use crate::error::{ClientError, Result};
use crate::session::ClientId;

/// Default location of the optional configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Runtime configuration for one client session.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the assistant backend (scheme, host, port).
    ///
    /// Default: `http://127.0.0.1:5000`.
    pub base_url: String,

    /// Reconnect attempts allowed after a disconnect before giving up.
    ///
    /// Default: **5**.
    pub max_reconnect_attempts: u32,

    /// Fixed delay between reconnect attempts, in milliseconds.
    ///
    /// Default: **1000 ms**.
    pub reconnect_delay_ms: u64,

    /// How long a finished task card stays visible, in milliseconds.
    ///
    /// Default: **5000 ms**.
    pub task_removal_grace_ms: u64,

    /// Delay between expanding the visualization panel and resizing its
    /// charts, in milliseconds.
    ///
    /// Default: **300 ms**.
    pub panel_resize_delay_ms: u64,

    /// Per-request HTTP timeout, in seconds.
    ///
    /// Default: **120 s** (keyword searches drive a real browser).
    pub request_timeout_secs: u64,

    /// Default tracing filter when `RUST_LOG` is unset.
    pub log_level: String,

    /// File the terminal UI writes its logs to.
    pub log_file: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".into(),
            max_reconnect_attempts: 5,
            reconnect_delay_ms: 1000,
            task_removal_grace_ms: 5000,
            panel_resize_delay_ms: 300,
            request_timeout_secs: 120,
            log_level: "info".into(),
            log_file: PathBuf::from("xhs.log"),
        }
    }
}

impl ClientConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the backend base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the reconnect attempt bound.
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Set the reconnect delay (in milliseconds).
    pub fn with_reconnect_delay_ms(mut self, ms: u64) -> Self {
        self.reconnect_delay_ms = ms;
        self
    }

    /// Set the finished-task grace period (in milliseconds).
    pub fn with_task_removal_grace_ms(mut self, ms: u64) -> Self {
        self.task_removal_grace_ms = ms;
        self
    }

    /// Set the deferred panel resize delay (in milliseconds).
    pub fn with_panel_resize_delay_ms(mut self, ms: u64) -> Self {
        self.panel_resize_delay_ms = ms;
        self
    }

    /// Set the HTTP request timeout (in seconds).
    pub fn with_request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    /// Set the default log level.
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Set the log file used by the terminal UI.
    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = path.into();
        self
    }

    // -- Durations ----------------------------------------------------------

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn task_removal_grace(&self) -> Duration {
        Duration::from_millis(self.task_removal_grace_ms)
    }

    pub fn panel_resize_delay(&self) -> Duration {
        Duration::from_millis(self.panel_resize_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    // -- Endpoints ----------------------------------------------------------

    /// Parse the base URL, rejecting schemes other than http/https.
    pub fn base(&self) -> Result<Url> {
        let url = Url::parse(&self.base_url)?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(ClientError::Config(format!(
                "base url must be http or https, got `{other}`"
            ))),
        }
    }

    /// Build the WebSocket URL for a session: `ws://<host>/ws/{client_id}`.
    ///
    /// `https` bases map to `wss`.
    pub fn ws_url(&self, client_id: &ClientId) -> Result<Url> {
        let mut url = self.base()?.join(&format!("ws/{}", client_id.as_str()))?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|()| ClientError::Config(format!("cannot use scheme `{scheme}`")))?;
        Ok(url)
    }

    // -- Loading ------------------------------------------------------------

    /// Load `.env`, then the default config file, then environment
    /// overrides.
    pub fn load_default() -> Result<Self> {
        Self::load_from(Path::new(DEFAULT_CONFIG_PATH))
    }

    /// Like [`load_default`](Self::load_default) with an explicit file.
    pub fn load_from(path: &Path) -> Result<Self> {
        if let Ok(env_path) = dotenvy::dotenv() {
            debug!(path = %env_path.display(), "loaded .env");
        }
        let config = Self::load(path)?;
        Ok(config.apply_overrides(|key| std::env::var(key).ok()))
    }

    /// Load the `[client]` table from a TOML file.
    ///
    /// A missing file or a missing `[client]` table yields the defaults.  A
    /// file that exists but is not valid TOML is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        Self::from_toml_str(&content)
            .map_err(|e| ClientError::Config(format!("{}: {e}", path.display())))
    }

    /// Parse a configuration from TOML text.
    pub fn from_toml_str(content: &str) -> std::result::Result<Self, String> {
        let table: toml::Table = content.parse().map_err(|e: toml::de::Error| e.to_string())?;
        let defaults = Self::default();

        let client = match table.get("client") {
            Some(toml::Value::Table(c)) => c,
            Some(_) => return Err("`client` must be a table".into()),
            None => return Ok(defaults),
        };

        let str_field = |key: &str| client.get(key).and_then(|v| v.as_str()).map(str::to_owned);
        let int_field = |key: &str| {
            client
                .get(key)
                .and_then(|v| v.as_integer())
                .map(|v| v.max(0) as u64)
        };

        for key in client.keys() {
            if !KNOWN_KEYS.contains(&key.as_str()) {
                warn!(key = %key, "unknown key in [client] config section");
            }
        }

        Ok(Self {
            base_url: str_field("base_url").unwrap_or(defaults.base_url),
            max_reconnect_attempts: int_field("max_reconnect_attempts")
                .map(|v| v.min(u64::from(u32::MAX)) as u32)
                .unwrap_or(defaults.max_reconnect_attempts),
            reconnect_delay_ms: int_field("reconnect_delay_ms")
                .unwrap_or(defaults.reconnect_delay_ms),
            task_removal_grace_ms: int_field("task_removal_grace_ms")
                .unwrap_or(defaults.task_removal_grace_ms),
            panel_resize_delay_ms: int_field("panel_resize_delay_ms")
                .unwrap_or(defaults.panel_resize_delay_ms),
            request_timeout_secs: int_field("request_timeout_secs")
                .map(|v| v.max(1))
                .unwrap_or(defaults.request_timeout_secs),
            log_level: str_field("log_level").unwrap_or(defaults.log_level),
            log_file: str_field("log_file")
                .map(PathBuf::from)
                .unwrap_or(defaults.log_file),
        })
    }

    /// Apply environment overrides using the given lookup function.
    pub fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup("XHS_BASE_URL").filter(|v| !v.trim().is_empty()) {
            self.base_url = url.trim().to_owned();
        }
        if let Some(level) = lookup("XHS_LOG_LEVEL").filter(|v| !v.trim().is_empty()) {
            self.log_level = level.trim().to_owned();
        }
        self
    }
}

const KNOWN_KEYS: &[&str] = &[
    "base_url",
    "max_reconnect_attempts",
    "reconnect_delay_ms",
    "task_removal_grace_ms",
    "panel_resize_delay_ms",
    "request_timeout_secs",
    "log_level",
    "log_file",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_stock_backend() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, "http://127.0.0.1:5000");
        assert_eq!(config.max_reconnect_attempts, 5);
        assert_eq!(config.reconnect_delay(), Duration::from_secs(1));
        assert_eq!(config.task_removal_grace(), Duration::from_secs(5));
        assert_eq!(config.panel_resize_delay(), Duration::from_millis(300));
    }

    #[test]
    fn builder_overrides_fields() {
        let config = ClientConfig::new()
            .with_base_url("http://10.0.0.2:8000")
            .with_max_reconnect_attempts(2)
            .with_reconnect_delay_ms(10);
        assert_eq!(config.base_url, "http://10.0.0.2:8000");
        assert_eq!(config.max_reconnect_attempts, 2);
        assert_eq!(config.reconnect_delay_ms, 10);
    }

    #[test]
    fn ws_url_uses_session_path() {
        let config = ClientConfig::default();
        let id = ClientId::new("1700000000000");
        let url = config.ws_url(&id).unwrap();
        assert_eq!(url.as_str(), "ws://127.0.0.1:5000/ws/1700000000000");
    }

    #[test]
    fn ws_url_maps_https_to_wss() {
        let config = ClientConfig::default().with_base_url("https://assistant.example.com");
        let url = config.ws_url(&ClientId::new("42")).unwrap();
        assert_eq!(url.as_str(), "wss://assistant.example.com/ws/42");
    }

    #[test]
    fn non_http_base_is_rejected() {
        let config = ClientConfig::default().with_base_url("ftp://example.com");
        assert!(matches!(config.base(), Err(ClientError::Config(_))));
    }

    #[test]
    fn toml_without_client_table_is_default() {
        let config = ClientConfig::from_toml_str("[other]\nx = 1\n").unwrap();
        assert_eq!(config.base_url, ClientConfig::default().base_url);
    }

    #[test]
    fn toml_client_table_is_read() {
        let config = ClientConfig::from_toml_str(
            r#"
            [client]
            base_url = "http://192.168.1.5:5000"
            max_reconnect_attempts = 3
            task_removal_grace_ms = 100
            log_file = "/tmp/xhs.log"
            "#,
        )
        .unwrap();
        assert_eq!(config.base_url, "http://192.168.1.5:5000");
        assert_eq!(config.max_reconnect_attempts, 3);
        assert_eq!(config.task_removal_grace_ms, 100);
        assert_eq!(config.reconnect_delay_ms, 1000);
        assert_eq!(config.log_file, PathBuf::from("/tmp/xhs.log"));
    }

    #[test]
    fn invalid_toml_is_an_error() {
        assert!(ClientConfig::from_toml_str("[client\nbase_url =").is_err());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.max_reconnect_attempts, 5);
    }

    #[test]
    fn file_is_loaded_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("default.toml");
        std::fs::write(&path, "[client]\nreconnect_delay_ms = 250\n").unwrap();
        let config = ClientConfig::load(&path).unwrap();
        assert_eq!(config.reconnect_delay_ms, 250);
    }

    #[test]
    fn env_overrides_apply() {
        let config = ClientConfig::default().apply_overrides(|key| match key {
            "XHS_BASE_URL" => Some(" http://backend:5000 ".into()),
            "XHS_LOG_LEVEL" => Some("debug".into()),
            _ => None,
        });
        assert_eq!(config.base_url, "http://backend:5000");
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let config = ClientConfig::default().apply_overrides(|_| Some("  ".into()));
        assert_eq!(config.base_url, "http://127.0.0.1:5000");
    }
}
