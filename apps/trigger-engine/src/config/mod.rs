//! Configuration module for the trigger engine.
//!
//! Loads a YAML file, interpolates `${VAR}` / `${VAR:-default}` environment
//! references, and validates the result at startup.
//!
//! # Usage
//!
//! ```rust,ignore
//! use trigger_engine::config::load_config;
//!
//! // Load from default path (config.yaml)
//! let config = load_config(None)?;
//!
//! // Access configuration values
//! println!("rebuild every {}s", config.monitor.rebuild_interval_secs);
//! ```

mod feeds;
mod monitor;
mod notify;
mod observability;
mod server;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use feeds::{BinanceFeedConfig, FeedsConfig};
pub use monitor::MonitorConfig;
pub use notify::{NotifyConfig, TelegramConfig};
pub use observability::ObservabilityConfig;
pub use server::ServerConfig;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        /// Path to the config file.
        path: String,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// Failed to parse YAML configuration.
    #[error("failed to parse config YAML: {0}")]
    ParseError(#[from] serde_yaml_bw::Error),

    /// Configuration validation failed.
    #[error("config validation failed: {0}")]
    ValidationError(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Operational HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Price feed configuration.
    #[serde(default)]
    pub feeds: FeedsConfig,
    /// Monitoring loop configuration.
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// Notification delivery configuration.
    #[serde(default)]
    pub notify: NotifyConfig,
    /// Logging and metrics configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ============================================
// Configuration Loading
// ============================================

/// Load configuration from a YAML file with environment variable
/// interpolation.
///
/// # Arguments
///
/// * `path` - Optional path to the config file. Defaults to "config.yaml".
///
/// # Errors
///
/// Returns a `ConfigError` if the file cannot be read, parsed, or validated.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or("config.yaml");

    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_string(),
        source: e,
    })?;

    load_config_from_string(&contents)
}

/// Load configuration from a YAML string (useful for testing).
///
/// # Errors
///
/// Returns a `ConfigError` if the YAML cannot be parsed or validated.
pub fn load_config_from_string(yaml: &str) -> Result<Config, ConfigError> {
    let interpolated = interpolate_env_vars(yaml);
    let config: Config = serde_yaml_bw::from_str(&interpolated)?;
    validate_config(&config)?;
    Ok(config)
}

/// Interpolate environment variables in a string.
///
/// Supports both `${VAR}` and `${VAR:-default}` syntax. Unset variables
/// without a default interpolate to the empty string.
#[allow(clippy::expect_used)] // the pattern is a compile-time constant
fn interpolate_env_vars(input: &str) -> String {
    use std::sync::OnceLock;

    static ENV_VAR_REGEX: OnceLock<regex::Regex> = OnceLock::new();

    let re = ENV_VAR_REGEX.get_or_init(|| {
        regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("env var regex is valid")
    });

    re.replace_all(input, |caps: &regex::Captures<'_>| {
        let var_name = &caps[1];
        let default_value = caps.get(2).map_or("", |m| m.as_str());

        match std::env::var(var_name) {
            Ok(v) if !v.is_empty() => v,
            _ => default_value.to_string(),
        }
    })
    .into_owned()
}

/// Validate configuration values.
fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.monitor.rebuild_interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "monitor.rebuild_interval_secs must be positive".to_string(),
        ));
    }

    if config.monitor.rebuild_escalation_threshold == 0 {
        return Err(ConfigError::ValidationError(
            "monitor.rebuild_escalation_threshold must be positive".to_string(),
        ));
    }

    if config.monitor.tick_queue_capacity == 0 || config.monitor.command_queue_capacity == 0 {
        return Err(ConfigError::ValidationError(
            "monitor queue capacities must be positive".to_string(),
        ));
    }

    monitor::parse_same_tick_priority(&config.monitor.same_tick_priority).map_err(|valid| {
        ConfigError::ValidationError(format!(
            "monitor.same_tick_priority must be one of: {valid:?}"
        ))
    })?;

    let feed = &config.feeds.binance;
    if !feed.ws_url.starts_with("ws://") && !feed.ws_url.starts_with("wss://") {
        return Err(ConfigError::ValidationError(
            "feeds.binance.ws_url must be a ws:// or wss:// URL".to_string(),
        ));
    }

    if feed.backoff_multiplier < 1.0 {
        return Err(ConfigError::ValidationError(
            "feeds.binance.backoff_multiplier must be at least 1.0".to_string(),
        ));
    }

    if feed.poll_interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "feeds.binance.poll_interval_secs must be positive".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = load_config_from_string("{}").unwrap();
        assert_eq!(config.monitor.rebuild_interval_secs, 60);
        assert_eq!(config.feeds.binance.max_reconnect_attempts, 5);
    }

    #[test]
    fn interpolates_env_default() {
        let yaml = r"
monitor:
  rebuild_interval_secs: ${TRIGGER_ENGINE_TEST_UNSET_VAR:-30}
";
        let config = load_config_from_string(yaml).unwrap();
        assert_eq!(config.monitor.rebuild_interval_secs, 30);
    }

    #[test]
    fn rejects_zero_rebuild_interval() {
        let yaml = r"
monitor:
  rebuild_interval_secs: 0
";
        assert!(matches!(
            load_config_from_string(yaml),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn rejects_unknown_priority() {
        let yaml = r"
monitor:
  same_tick_priority: whichever
";
        assert!(load_config_from_string(yaml).is_err());
    }

    #[test]
    fn rejects_non_websocket_url() {
        let yaml = r"
feeds:
  binance:
    ws_url: http://example.com
";
        assert!(load_config_from_string(yaml).is_err());
    }
}
