//! Price feed configuration.

use serde::{Deserialize, Serialize};

/// Price feed configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FeedsConfig {
    /// Binance configuration (primary provider).
    #[serde(default)]
    pub binance: BinanceFeedConfig,
}

/// Binance feed configuration: one streaming endpoint plus the REST endpoint
/// used by the polling fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinanceFeedConfig {
    /// WebSocket base URL for the combined stream.
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    /// REST base URL for batch price polling.
    #[serde(default = "default_rest_url")]
    pub rest_url: String,
    /// Bound on stream establishment before falling back to polling.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Initial reconnect backoff in milliseconds.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Reconnect backoff ceiling in seconds.
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,
    /// Backoff multiplier per attempt.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    /// Reconnect attempts before degrading to polling.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    /// Polling cadence while degraded, in seconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// How often to retry the stream while polling, in seconds.
    #[serde(default = "default_streaming_retry")]
    pub streaming_retry_secs: u64,
    /// Per-request timeout for polling calls, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for BinanceFeedConfig {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            rest_url: default_rest_url(),
            connect_timeout_secs: default_connect_timeout(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_secs: default_max_backoff_secs(),
            backoff_multiplier: default_backoff_multiplier(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            poll_interval_secs: default_poll_interval(),
            streaming_retry_secs: default_streaming_retry(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_ws_url() -> String {
    "wss://stream.binance.com:9443".to_string()
}

fn default_rest_url() -> String {
    "https://api.binance.com".to_string()
}

const fn default_connect_timeout() -> u64 {
    10
}

const fn default_initial_backoff_ms() -> u64 {
    1000
}

const fn default_max_backoff_secs() -> u64 {
    60
}

const fn default_backoff_multiplier() -> f64 {
    2.0
}

const fn default_max_reconnect_attempts() -> u32 {
    5
}

const fn default_poll_interval() -> u64 {
    5
}

const fn default_streaming_retry() -> u64 {
    60
}

const fn default_request_timeout() -> u64 {
    10
}
