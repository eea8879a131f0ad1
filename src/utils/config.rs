//! Configuration management for WatchRoom
//!
//! This module handles loading and managing application configuration
//! from various sources including config files and environment variables.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use crate::utils::error::{WatchRoomError, Result};

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Room service endpoints
    pub server: ServerConfig,

    /// Playback synchronization tolerances
    pub sync: SyncConfig,

    /// Media widget settings
    pub player: PlayerConfig,

    /// General application settings
    pub general: GeneralConfig,
}

/// Room service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP base URL of the room service
    pub base_url: String,

    /// WebSocket dial timeout
    pub connect_timeout_secs: u64,

    /// How long to wait for the initial snapshot after connecting
    pub first_state_timeout_secs: u64,
}

/// Synchronization configuration
///
/// The defaults are the empirically tuned values every client in a room
/// is expected to share.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Position ticker interval in milliseconds
    pub tick_interval_ms: u64,

    /// Drift in seconds above which a snapshot snaps the local position
    pub reconcile_threshold: f64,

    /// Drift in seconds above which the widget is seeked
    pub seek_tolerance: f64,

    /// Drift in seconds above which the widget position overrides the estimate
    pub correction_threshold: f64,

    /// Widget correction loop interval in milliseconds
    pub correction_interval_ms: u64,
}

/// Media widget configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Path to the mpv executable
    pub mpv_path: String,

    /// IPC socket path (a temp path is chosen when unset)
    pub ipc_socket: Option<PathBuf>,

    /// Extra command line arguments passed to mpv
    pub extra_args: Vec<String>,

    /// How long to wait for the widget to accept connections
    pub ready_timeout_ms: u64,
}

/// General application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            connect_timeout_secs: 5,
            first_state_timeout_secs: 10,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 250,
            reconcile_threshold: 2.5,
            seek_tolerance: 0.3,
            correction_threshold: 1.0,
            correction_interval_ms: 1000,
        }
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            mpv_path: "mpv".to_string(),
            ipc_socket: None,
            extra_args: Vec::new(),
            ready_timeout_ms: 5000,
        }
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn first_state_timeout(&self) -> Duration {
        Duration::from_secs(self.first_state_timeout_secs)
    }
}

impl SyncConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Seconds added to the display position on every tick
    pub fn tick_seconds(&self) -> f64 {
        self.tick_interval().as_secs_f64()
    }

    pub fn correction_interval(&self) -> Duration {
        Duration::from_millis(self.correction_interval_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.tick_interval_ms == 0 || self.correction_interval_ms == 0 {
            return Err(WatchRoomError::Config("Timer intervals must be non-zero".to_string()));
        }

        let thresholds = [
            ("reconcile_threshold", self.reconcile_threshold),
            ("seek_tolerance", self.seek_tolerance),
            ("correction_threshold", self.correction_threshold),
        ];
        for (name, value) in thresholds {
            if !(value.is_finite() && value > 0.0) {
                return Err(WatchRoomError::Config(format!("{} must be a positive number", name)));
            }
        }

        Ok(())
    }
}

impl PlayerConfig {
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }
}

impl Config {
    /// Load configuration from various sources
    ///
    /// Configuration is loaded in the following order (later sources override earlier):
    /// 1. Default values
    /// 2. System config file (/etc/watchroom/config.toml on Linux)
    /// 3. User config file (~/.config/watchroom/config.toml on Linux)
    /// 4. Environment variables (WATCHROOM_* prefix)
    pub fn load() -> Result<Self> {
        let files: Vec<PathBuf> = [Self::system_config_path(), Self::user_config_path()]
            .into_iter()
            .flatten()
            .filter(|path| path.exists())
            .collect();

        let mut config = Self::from_layers(&files)?;
        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a single TOML file on top of the defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let config = Self::from_layers(&[path.to_path_buf()])?;
        config.validate()?;
        Ok(config)
    }

    /// Layer TOML files over the defaults, later files winning key by key
    ///
    /// A key missing from every file keeps its default through
    /// `#[serde(default)]`.
    pub fn from_layers(paths: &[PathBuf]) -> Result<Self> {
        let mut layered = toml::Table::new();
        for path in paths {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| WatchRoomError::Config(format!("Failed to read config file {:?}: {}", path, e)))?;
            let table: toml::Table = toml::from_str(&contents)
                .map_err(|e| WatchRoomError::Config(format!("Failed to parse config file {:?}: {}", path, e)))?;
            merge_tables(&mut layered, table);
        }

        toml::Value::Table(layered)
            .try_into()
            .map_err(|e| WatchRoomError::Config(format!("Invalid configuration: {}", e)))
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(base_url) = std::env::var("WATCHROOM_API_BASE_URL") {
            if !base_url.is_empty() {
                self.server.base_url = base_url;
            }
        }

        if let Ok(interval) = std::env::var("WATCHROOM_TICK_INTERVAL_MS") {
            self.sync.tick_interval_ms = interval.parse()
                .map_err(|_| WatchRoomError::Config("Invalid WATCHROOM_TICK_INTERVAL_MS".to_string()))?;
        }

        if let Ok(mpv_path) = std::env::var("WATCHROOM_MPV_PATH") {
            self.player.mpv_path = mpv_path;
        }

        if let Ok(log_level) = std::env::var("WATCHROOM_LOG_LEVEL") {
            self.general.log_level = log_level;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.server.base_url)?;

        if self.server.connect_timeout_secs == 0 || self.server.first_state_timeout_secs == 0 {
            return Err(WatchRoomError::Config("Server timeouts must be non-zero".to_string()));
        }

        self.sync.validate()?;

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.general.log_level.as_str()) {
            return Err(WatchRoomError::Config(format!(
                "Invalid log level '{}', must be one of: {:?}",
                self.general.log_level,
                valid_log_levels
            )));
        }

        Ok(())
    }

    /// Get system config file path
    fn system_config_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        return Some(PathBuf::from("/etc/watchroom/config.toml"));

        #[cfg(target_os = "windows")]
        return std::env::var("PROGRAMDATA").ok()
            .map(|p| PathBuf::from(p).join("WatchRoom").join("config.toml"));

        #[cfg(target_os = "macos")]
        return Some(PathBuf::from("/Library/Application Support/WatchRoom/config.toml"));

        #[allow(unreachable_code)]
        None
    }

    /// Get user config file path
    fn user_config_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        return dirs::config_dir()
            .map(|p| p.join("watchroom").join("config.toml"));

        #[cfg(not(target_os = "linux"))]
        return dirs::config_dir()
            .map(|p| p.join("WatchRoom").join("config.toml"));
    }
}

/// Overlay `top` onto `base`; nested tables merge, other values replace
fn merge_tables(base: &mut toml::Table, top: toml::Table) {
    for (key, value) in top {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(overlay)) => merge_tables(existing, overlay),
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}
