//! Application configuration management.
//!
//! Handles loading, saving, and accessing client configuration including
//! the server base URL, connection tuning, and chat behaviour. Configuration
//! is persisted as TOML on disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::constants;
use crate::error::{RelayError, RelayResult};

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server connection settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Socket connection settings.
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Chat behaviour settings.
    #[serde(default)]
    pub chat: ChatConfig,
}

/// Server connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the chat server (e.g. "https://chat.example.com").
    #[serde(default)]
    pub base_url: String,

    /// REST request timeout in milliseconds.
    #[serde(default = "default_api_timeout")]
    pub api_timeout_ms: u64,

    /// Maximum automatic retries for transient REST failures.
    #[serde(default = "default_api_max_retries")]
    pub api_max_retries: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for log files. If empty, uses the default location.
    #[serde(default)]
    pub directory: String,

    /// Enable JSON structured logging output for the file layer.
    #[serde(default)]
    pub json_output: bool,
}

/// Socket connection tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Base reconnection delay in seconds. Doubles per attempt.
    #[serde(default = "default_reconnect_base")]
    pub reconnect_base_delay_secs: u64,

    /// Cap on the reconnection delay in seconds.
    #[serde(default = "default_reconnect_max")]
    pub reconnect_max_delay_secs: u64,

    /// Maximum reconnection attempts before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_reconnect_attempts: u32,

    /// Heartbeat interval in milliseconds, both directions.
    #[serde(default = "default_heartbeat")]
    pub heartbeat_interval_ms: u64,
}

/// Chat behaviour configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Number of messages per history page.
    #[serde(default = "default_history_page_size")]
    pub history_page_size: u32,

    /// Typing-indicator inactivity window in milliseconds.
    #[serde(default = "default_typing_idle")]
    pub typing_idle_timeout_ms: u64,

    /// Delay before the pinned-summary fetch after opening a chat.
    #[serde(default = "default_pinned_delay")]
    pub pinned_fetch_delay_ms: u64,
}

// Default value functions for serde

fn default_api_timeout() -> u64 {
    constants::DEFAULT_API_TIMEOUT_MS
}

fn default_api_max_retries() -> u32 {
    constants::API_MAX_RETRIES
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_reconnect_base() -> u64 {
    constants::RECONNECT_BASE_DELAY_SECS
}

fn default_reconnect_max() -> u64 {
    constants::RECONNECT_MAX_DELAY_SECS
}

fn default_max_attempts() -> u32 {
    constants::MAX_RECONNECT_ATTEMPTS
}

fn default_heartbeat() -> u64 {
    constants::HEARTBEAT_INTERVAL_MS
}

fn default_history_page_size() -> u32 {
    constants::HISTORY_PAGE_SIZE
}

fn default_typing_idle() -> u64 {
    constants::TYPING_IDLE_TIMEOUT_MS
}

fn default_pinned_delay() -> u64 {
    constants::PINNED_FETCH_DELAY_MS
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            connection: ConnectionConfig::default(),
            chat: ChatConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_timeout_ms: default_api_timeout(),
            api_max_retries: default_api_max_retries(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: String::new(),
            json_output: false,
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            reconnect_base_delay_secs: default_reconnect_base(),
            reconnect_max_delay_secs: default_reconnect_max(),
            max_reconnect_attempts: default_max_attempts(),
            heartbeat_interval_ms: default_heartbeat(),
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_page_size: default_history_page_size(),
            typing_idle_timeout_ms: default_typing_idle(),
            pinned_fetch_delay_ms: default_pinned_delay(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default config file path.
    pub fn load_default() -> RelayResult<Self> {
        let path = Self::default_config_path()?;
        if path.exists() {
            Self::load_from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> RelayResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to the default config file path.
    pub fn save_default(&self) -> RelayResult<()> {
        let path = Self::default_config_path()?;
        self.save_to_file(&path)
    }

    /// Save configuration to a specific file path.
    pub fn save_to_file(&self, path: &Path) -> RelayResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)
            .map_err(|e| RelayError::Config(format!("failed to serialize config: {e}")))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Get the platform data directory for Relay.
    pub fn data_dir() -> RelayResult<PathBuf> {
        let base = dirs::data_dir()
            .ok_or_else(|| RelayError::Config("no platform data directory".into()))?;
        Ok(base.join("relay"))
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> RelayResult<PathBuf> {
        Ok(Self::data_dir()?.join("config.toml"))
    }

    /// Get the effective log directory, using the configured path or the default.
    pub fn effective_log_dir(&self) -> RelayResult<PathBuf> {
        if self.logging.directory.is_empty() {
            Ok(Self::data_dir()?.join("logs"))
        } else {
            Ok(PathBuf::from(&self.logging.directory))
        }
    }

    /// Check whether the server connection is configured.
    pub fn is_server_configured(&self) -> bool {
        !self.server.base_url.is_empty()
    }

    /// Sanitize and normalize a server base URL.
    ///
    /// Ensures the address has a scheme and strips trailing slashes.
    pub fn sanitize_base_url(address: &str) -> String {
        let trimmed = address.trim().trim_matches('"').trim();
        if trimmed.is_empty() {
            return String::new();
        }

        let with_scheme = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            trimmed.to_string()
        } else {
            format!("https://{trimmed}")
        };

        with_scheme.trim_end_matches('/').to_string()
    }
}

/// Thread-safe configuration holder for shared access across components.
#[derive(Clone)]
pub struct ConfigHandle {
    inner: Arc<RwLock<AppConfig>>,
}

impl ConfigHandle {
    /// Create a new configuration handle.
    pub fn new(config: AppConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Read the configuration.
    pub async fn read(&self) -> tokio::sync::RwLockReadGuard<'_, AppConfig> {
        self.inner.read().await
    }

    /// Write/update the configuration.
    pub async fn write(&self) -> tokio::sync::RwLockWriteGuard<'_, AppConfig> {
        self.inner.write().await
    }

    /// Save the current configuration to disk.
    pub async fn save(&self) -> RelayResult<()> {
        let config = self.inner.read().await;
        config.save_default()
    }
}
