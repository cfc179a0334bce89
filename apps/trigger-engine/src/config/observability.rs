//! Logging and metrics configuration.

use serde::{Deserialize, Serialize};

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Default log level filter when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// OTLP trace exporter endpoint; `None` disables the OpenTelemetry
    /// layer and logs to console only.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
    /// Whether to expose Prometheus metrics.
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
    /// Bind address of the Prometheus metrics listener.
    #[serde(default = "default_metrics_addr")]
    pub metrics_addr: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            otlp_endpoint: None,
            metrics_enabled: default_metrics_enabled(),
            metrics_addr: default_metrics_addr(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

const fn default_metrics_enabled() -> bool {
    true
}

fn default_metrics_addr() -> String {
    "0.0.0.0:9090".to_string()
}
