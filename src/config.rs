//! Configuration loading from TOML files and environment variables.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::IdleError;
use crate::idle::{EventKind, ListenerOptions, DEFAULT_EVENTS};

/// Root configuration structure for the daemon.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub idle: IdleConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Idle timer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdleConfig {
    /// Inactivity allowed before going idle, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Event kinds counted as activity.
    #[serde(default = "default_events")]
    pub events: Vec<EventKind>,
    /// Trailing-edge debounce of `on_action`, in milliseconds.
    #[serde(default)]
    pub debounce_ms: u64,
    /// Leading-edge throttle of `on_action`, in milliseconds.
    #[serde(default)]
    pub throttle_ms: u64,
    /// Throttle applied to the raw event handler, in milliseconds.
    #[serde(default = "default_events_throttle_ms")]
    pub events_throttle_ms: u64,
    /// Start the countdown as soon as the timer is created.
    #[serde(default = "default_true")]
    pub start_on_mount: bool,
    /// Once idle, ignore activity until an explicit reset.
    #[serde(default)]
    pub stop_on_idle: bool,
    /// Register listeners for the capture phase.
    #[serde(default = "default_true")]
    pub capture: bool,
    /// Register listeners as passive.
    #[serde(default = "default_true")]
    pub passive: bool,
}

impl Default for IdleConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            events: default_events(),
            debounce_ms: 0,
            throttle_ms: 0,
            events_throttle_ms: default_events_throttle_ms(),
            start_on_mount: true,
            stop_on_idle: false,
            capture: true,
            passive: true,
        }
    }
}

impl IdleConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }

    pub fn events_throttle(&self) -> Duration {
        Duration::from_millis(self.events_throttle_ms)
    }

    pub fn listener_options(&self) -> ListenerOptions {
        ListenerOptions {
            capture: self.capture,
            passive: self.passive,
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> std::result::Result<(), IdleError> {
        if self.timeout_ms == 0 {
            return Err(IdleError::Configuration(
                "timeout must be greater than 0".to_string(),
            ));
        }
        if self.debounce_ms > 0 && self.throttle_ms > 0 {
            return Err(IdleError::Configuration(
                "debounce and throttle cannot both be set".to_string(),
            ));
        }
        Ok(())
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Data directory for the transition journal.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit logs as JSON objects instead of text.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            level: default_log_level(),
            json: false,
        }
    }
}

impl LoggingConfig {
    /// Returns the logs directory path.
    pub fn logs_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}

// Default value functions
fn default_timeout_ms() -> u64 {
    1_200_000
}

fn default_events() -> Vec<EventKind> {
    DEFAULT_EVENTS.to_vec()
}

fn default_events_throttle_ms() -> u64 {
    200
}

fn default_true() -> bool {
    true
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".idlewatch"))
        .unwrap_or_else(|| PathBuf::from(".idlewatch"))
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse config file")?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = config_path {
            Self::from_file(path)?
        } else {
            let default_paths = [
                PathBuf::from("config/default.toml"),
                dirs::config_dir()
                    .map(|d| d.join("idlewatch/config.toml"))
                    .unwrap_or_default(),
            ];

            let mut loaded = None;
            for path in &default_paths {
                if path.exists() {
                    loaded = Some(Self::from_file(path)?);
                    break;
                }
            }
            loaded.unwrap_or_default()
        };

        config.apply_env_overrides();
        config.logging.data_dir = expand_tilde(&config.logging.data_dir);

        Ok(config)
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let parsed = |key: &str| lookup(key).and_then(|v| v.parse::<u64>().ok());

        if let Some(v) = parsed("IDLEWATCH_TIMEOUT_MS") {
            self.idle.timeout_ms = v;
        }
        if let Some(v) = parsed("IDLEWATCH_DEBOUNCE_MS") {
            self.idle.debounce_ms = v;
        }
        if let Some(v) = parsed("IDLEWATCH_THROTTLE_MS") {
            self.idle.throttle_ms = v;
        }
        if let Some(v) = parsed("IDLEWATCH_EVENTS_THROTTLE_MS") {
            self.idle.events_throttle_ms = v;
        }
        if let Some(v) = lookup("IDLEWATCH_STOP_ON_IDLE").and_then(|v| v.parse().ok()) {
            self.idle.stop_on_idle = v;
        }
        if let Some(val) = lookup("IDLEWATCH_DATA_DIR") {
            self.logging.data_dir = PathBuf::from(val);
        }
        if let Some(val) = lookup("IDLEWATCH_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Some(v) = lookup("IDLEWATCH_LOG_JSON").and_then(|v| v.parse().ok()) {
            self.logging.json = v;
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        self.idle.validate()?;
        if self.logging.level.trim().is_empty() {
            anyhow::bail!("Log level cannot be empty");
        }
        Ok(())
    }
}

/// Expand ~ to home directory.
fn expand_tilde(path: &Path) -> PathBuf {
    if let Some(path_str) = path.to_str() {
        if let Some(rest) = path_str.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn defaults_match_documented_values() {
        let idle = IdleConfig::default();
        assert_eq!(idle.timeout(), Duration::from_millis(1_200_000));
        assert_eq!(idle.events.len(), DEFAULT_EVENTS.len());
        assert_eq!(idle.events_throttle(), Duration::from_millis(200));
        assert!(idle.start_on_mount);
        assert!(!idle.stop_on_idle);
        assert!(idle.capture && idle.passive);
        assert_ok!(idle.validate());
    }

    #[test]
    fn debounce_and_throttle_are_exclusive() {
        let idle = IdleConfig {
            debounce_ms: 100,
            throttle_ms: 100,
            ..IdleConfig::default()
        };
        let err = assert_err!(idle.validate());
        assert!(matches!(err, IdleError::Configuration(_)));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let idle = IdleConfig {
            timeout_ms: 0,
            ..IdleConfig::default()
        };
        assert_err!(idle.validate());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[idle]\ntimeout_ms = 5000\nevents = [\"keydown\", \"scroll\"]\nstop_on_idle = true\n\n[logging]\nlevel = \"debug\""
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.idle.timeout_ms, 5000);
        assert_eq!(
            config.idle.events,
            vec![EventKind::KeyDown, EventKind::Other("scroll".to_string())]
        );
        assert!(config.idle.stop_on_idle);
        assert_eq!(config.idle.events_throttle_ms, 200);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[idle]\ntimeout_ms = \"soon\"").unwrap();
        assert!(Config::from_file(file.path()).is_err());
    }

    #[test]
    fn overrides_replace_parsed_values_only() {
        let env: HashMap<&str, &str> = [
            ("IDLEWATCH_TIMEOUT_MS", "3000"),
            ("IDLEWATCH_THROTTLE_MS", "not-a-number"),
            ("IDLEWATCH_STOP_ON_IDLE", "true"),
            ("IDLEWATCH_LOG_LEVEL", "trace"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.idle.timeout_ms, 3000);
        assert_eq!(config.idle.throttle_ms, 0);
        assert!(config.idle.stop_on_idle);
        assert_eq!(config.logging.level, "trace");
    }

    #[test]
    fn tilde_expands_to_home() {
        let expanded = expand_tilde(Path::new("~/idle"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expanded, home.join("idle"));
        }
        assert_eq!(expand_tilde(Path::new("/tmp/x")), PathBuf::from("/tmp/x"));
    }
}
