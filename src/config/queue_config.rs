//! queuedesk configuration file handling
//!
//! Loads and manages the ~/.config/queuedesk/config.yaml file.

use crate::ledger::RetentionPolicy;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Base directory for config and data (~/.config/queuedesk)
pub fn config_dir() -> PathBuf {
    // Always use ~/.config for consistency across platforms (macOS, Linux)
    let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(".config");
    path.push("queuedesk");
    path
}

/// Shared store backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// SQLite file shared by every actor process
    #[default]
    Sqlite,
    /// Process-local; state is lost on exit
    Memory,
}

/// Shared store settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Path to the SQLite database
    #[serde(default = "default_store_path")]
    pub path: PathBuf,

    /// Enable WAL mode for concurrent readers
    #[serde(default = "default_true")]
    pub wal_mode: bool,
}

fn default_store_path() -> PathBuf {
    config_dir().join("queue.db")
}

fn default_true() -> bool {
    true
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: default_store_path(),
            wal_mode: true,
        }
    }
}

/// Poll loop settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Interval between store reads, in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Event broadcast channel capacity
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_event_channel_capacity() -> usize {
    1000
}

impl SyncSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

/// How the call chime is played
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    /// Terminal bell
    #[default]
    Bell,
    /// External tone generator (see `command`)
    Command,
    /// Log line only
    Log,
    /// Silent
    None,
}

/// Notification settings
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default)]
    pub kind: SignalKind,

    /// Tone command template with `{freq}` and `{duration}` placeholders
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

/// HTTP surface settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Ticket requests allowed per client per window
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,

    /// Rate limit window, in seconds
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Request body size limit in bytes
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

fn default_bind() -> String {
    "127.0.0.1:8090".to_string()
}

fn default_max_requests() -> u32 {
    120
}

fn default_window_secs() -> u64 {
    60
}

fn default_max_body_size() -> usize {
    64 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_requests: default_max_requests(),
            window_secs: default_window_secs(),
            max_body_size: default_max_body_size(),
        }
    }
}

/// queuedesk configuration
///
/// Every section is optional in the file; missing sections take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub retention: RetentionPolicy,

    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default)]
    pub notification: NotificationConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

impl QueueConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from the default path (~/.config/queuedesk/config.yaml)
    pub fn load_default() -> Result<Self> {
        Self::load(Self::default_path())
    }

    /// Load from `path` if given, else the default path, else built-in defaults
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let default = Self::default_path();
                if default.exists() {
                    Self::load_default()
                } else {
                    tracing::debug!("No config file found, using defaults");
                    Ok(Self::new())
                }
            }
        }
    }

    /// Load configuration from a specific path
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(crate::QueueError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        tracing::info!(path = %path.display(), "Loading queuedesk configuration");

        let content = fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;

        tracing::debug!(
            backend = ?config.store.backend,
            poll_interval_ms = config.sync.poll_interval_ms,
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Save configuration to a specific path
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        tracing::info!(path = %path.display(), "Saving queuedesk configuration");

        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml)?;

        Ok(())
    }

    /// Get the default config path (~/.config/queuedesk/config.yaml)
    pub fn default_path() -> PathBuf {
        config_dir().join("config.yaml")
    }
}
