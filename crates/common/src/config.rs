//! Application configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{VigilError, VigilResult};

/// Environment variable overriding the monitoring endpoint.
pub const MONITOR_URL_ENV: &str = "VIGIL_MONITOR_URL";

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Origin used to build test access URLs (`<origin>/test/<id>`).
    pub origin: String,

    /// Record store snapshot used by the CLI.
    pub store_path: PathBuf,

    /// Remote proctor connection.
    pub monitoring: MonitoringConfig,

    /// Submission retry policy.
    pub submission: SubmissionConfig,

    /// Countdown settings.
    pub timer: TimerConfig,

    /// Camera/microphone request.
    pub media: MediaConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Monitoring channel parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// WebSocket endpoint of the remote proctor.
    pub url: String,

    /// Interval between captured media chunks.
    pub chunk_interval_ms: u64,

    /// Outbound messages buffered before chunks are dropped.
    pub outbound_buffer: usize,

    /// Delay before reconnecting after connection loss.
    pub reconnect_delay_ms: u64,

    /// Reconnect attempts before the channel gives up.
    pub max_reconnect_attempts: u32,
}

/// Bounded retry for the submission write.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmissionConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub backoff_multiplier: u32,
}

/// Countdown timer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerConfig {
    /// How often the remaining time is recomputed.
    pub tick_interval_ms: u64,

    /// Tick lateness (ms) above which the host is reported as throttled.
    pub drift_warn_ms: u64,
}

/// Media constraints requested during setup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub facing_mode: String,
    pub audio: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "vigil_session=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost:3000".to_string(),
            store_path: data_dir().join("store.json"),
            monitoring: MonitoringConfig::default(),
            submission: SubmissionConfig::default(),
            timer: TimerConfig::default(),
            media: MediaConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8080/monitor".to_string(),
            chunk_interval_ms: 1000,
            outbound_buffer: 64,
            reconnect_delay_ms: 2000,
            max_reconnect_attempts: 5,
        }
    }
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 500,
            backoff_multiplier: 2,
        }
    }
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            drift_warn_ms: 1500,
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ideal_width: 1280,
            ideal_height: 720,
            facing_mode: "user".to_string(),
            audio: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl MonitoringConfig {
    pub fn chunk_interval(&self) -> Duration {
        Duration::from_millis(self.chunk_interval_ms.max(1))
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

impl SubmissionConfig {
    /// Backoff before retry number `attempt` (1-based; the first retry waits
    /// `initial_backoff_ms`).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = u64::from(self.backoff_multiplier.max(1))
            .saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.initial_backoff_ms.saturating_mul(factor))
    }
}

impl TimerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        let mut config = if config_path.exists() {
            match Self::load_from(&config_path) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!(path = ?config_path, error = %e, "Failed to load config, using defaults");
                    Self::default()
                }
            }
        } else {
            Self::default()
        };
        config.apply_env();
        config
    }

    /// Load config from an explicit file.
    pub fn load_from(path: &Path) -> VigilResult<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| VigilError::config(format!("Failed to parse {}: {e}", path.display())))
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(MONITOR_URL_ENV) {
            if !url.trim().is_empty() {
                self.monitoring.url = url;
            }
        }
    }
}

/// Standard config file location.
fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"));
    base.join("vigil").join("config.json")
}

fn data_dir() -> PathBuf {
    let base = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local").join("share"));
    base.join("vigil")
}

fn home_dir() -> PathBuf {
    PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string()))
}
