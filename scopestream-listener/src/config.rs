//! Configuration for the listener bridge.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use scopestream_common::LoggingConfig;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete bridge configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListenerBridgeConfig {
    /// Listener poll timing
    #[serde(default)]
    pub listener: ListenerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Poll timing for the listener worker.
///
/// The defaults are tuned to the external application's observed behavior:
/// session creation is multi-step, so a settle delay follows the first
/// observed session-count change before metadata is trusted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerConfig {
    /// Interval between session-count polls while waiting for a new
    /// session, in milliseconds.
    #[serde(default = "default_session_poll_interval_ms")]
    pub session_poll_interval_ms: u64,

    /// Delay applied after first observing a session-count change, to let
    /// the external application finish initializing the session, in
    /// milliseconds.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Interval between metadata polls while watching a session, in
    /// milliseconds.
    #[serde(default = "default_watch_interval_ms")]
    pub watch_interval_ms: u64,
}

fn default_session_poll_interval_ms() -> u64 {
    500
}

fn default_settle_delay_ms() -> u64 {
    3000
}

fn default_watch_interval_ms() -> u64 {
    100
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            session_poll_interval_ms: default_session_poll_interval_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            watch_interval_ms: default_watch_interval_ms(),
        }
    }
}

impl ListenerConfig {
    pub fn session_poll_interval(&self) -> Duration {
        Duration::from_millis(self.session_poll_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn watch_interval(&self) -> Duration {
        Duration::from_millis(self.watch_interval_ms)
    }
}

impl ListenerBridgeConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: ListenerBridgeConfig = json5::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listener.session_poll_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "session_poll_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.listener.watch_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "watch_interval_ms must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_design_constants() {
        let config = ListenerConfig::default();
        assert_eq!(config.session_poll_interval(), Duration::from_millis(500));
        assert_eq!(config.settle_delay(), Duration::from_secs(3));
        assert_eq!(config.watch_interval(), Duration::from_millis(100));
    }

    #[test]
    fn test_parse_partial_config() {
        let json = r#"{
            listener: {
                watch_interval_ms: 50,
            },
            logging: { level: "debug" },
        }"#;

        let config: ListenerBridgeConfig = json5::from_str(json).unwrap();
        assert_eq!(config.listener.watch_interval_ms, 50);
        assert_eq!(config.listener.session_poll_interval_ms, 500);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_validate_zero_interval() {
        let json = r#"{
            listener: { session_poll_interval_ms: 0 },
        }"#;

        let config: ListenerBridgeConfig = json5::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_config_is_valid() {
        let config: ListenerBridgeConfig = json5::from_str("{}").unwrap();
        config.validate().unwrap();
    }
}
