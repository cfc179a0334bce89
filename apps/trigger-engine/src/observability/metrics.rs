//! Prometheus metrics for the trigger engine.
//!
//! Counters and gauges for tick throughput, trigger firing, rebuild cycles,
//! feed mode transitions, and downstream report latency. The exporter serves
//! `/metrics` on its own listener.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

use crate::config::ObservabilityConfig;
use crate::feed::FeedMode;

/// Error type for metrics setup.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// The configured listen address is invalid.
    #[error("invalid metrics address '{addr}': {message}")]
    InvalidAddress {
        /// The configured address.
        addr: String,
        /// Parse error details.
        message: String,
    },
    /// Failed to install the metrics exporter.
    #[error("metrics installation error: {0}")]
    Installation(String),
}

/// Initialize the Prometheus metrics exporter.
///
/// No-op when metrics are disabled in configuration.
///
/// # Errors
///
/// Returns an error if the address cannot be parsed or the listener fails to
/// start (e.g. port already in use).
pub fn init_metrics(config: &ObservabilityConfig) -> Result<(), MetricsError> {
    if !config.metrics_enabled {
        tracing::info!("metrics exporter disabled");
        return Ok(());
    }

    let addr: SocketAddr =
        config
            .metrics_addr
            .parse()
            .map_err(|e: std::net::AddrParseError| MetricsError::InvalidAddress {
                addr: config.metrics_addr.clone(),
                message: e.to_string(),
            })?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| MetricsError::Installation(e.to_string()))?;

    tracing::info!(addr = %addr, "Prometheus metrics exporter started");

    Ok(())
}

// ============================================================================
// Tick Processing Metrics
// ============================================================================

/// Record one processed price tick.
pub fn record_tick_processed() {
    counter!("ticks_processed_total").increment(1);
}

/// Record a fired trigger event.
///
/// # Arguments
///
/// * `kind` - Hit kind label (e.g. "stop_loss", "near_take_profit")
pub fn record_trigger_fired(kind: &'static str) {
    counter!("triggers_fired_total", "kind" => kind).increment(1);
}

/// Record a duplicate hit suppressed by the deduplicator.
pub fn record_duplicate_suppressed() {
    counter!("duplicate_hits_suppressed_total").increment(1);
}

// ============================================================================
// Rebuild Metrics
// ============================================================================

/// Record a full rebuild cycle.
///
/// # Arguments
///
/// * `outcome` - "ok" or "failed"
/// * `seconds` - Wall time of the rebuild query + projection
pub fn record_rebuild(outcome: &'static str, seconds: f64) {
    counter!("index_rebuilds_total", "outcome" => outcome).increment(1);
    histogram!("index_rebuild_duration_seconds", "outcome" => outcome).record(seconds);
}

/// Record an incremental update application.
///
/// # Arguments
///
/// * `outcome` - "applied" or "stale"
pub fn record_incremental_update(outcome: &'static str) {
    counter!("incremental_updates_total", "outcome" => outcome).increment(1);
}

/// Record the current number of indexed triggers and watched instruments.
#[allow(clippy::cast_precision_loss)]
pub fn record_index_size(triggers: usize, symbols: usize) {
    gauge!("active_triggers").set(triggers as f64);
    gauge!("watched_symbols").set(symbols as f64);
}

// ============================================================================
// Feed Metrics
// ============================================================================

/// Record a feed delivery-mode transition.
pub fn record_feed_mode(mode: FeedMode) {
    counter!("feed_mode_changes_total", "mode" => mode.as_str()).increment(1);

    let available = match mode {
        FeedMode::Streaming | FeedMode::Polling => 1.0,
        FeedMode::Unavailable => 0.0,
    };
    gauge!("feed_available").set(available);
}

// ============================================================================
// Downstream Report Metrics
// ============================================================================

/// Record a downstream hit report attempt.
///
/// # Arguments
///
/// * `target` - "trade_update" or "notifier"
/// * `outcome` - "ok", "error", or "timeout"
/// * `seconds` - Call latency
pub fn record_hit_report(target: &'static str, outcome: &'static str, seconds: f64) {
    counter!("hit_reports_total", "target" => target, "outcome" => outcome).increment(1);
    histogram!("hit_report_duration_seconds", "target" => target).record(seconds);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_metrics_init_is_noop() {
        let config = ObservabilityConfig {
            metrics_enabled: false,
            ..Default::default()
        };
        assert!(init_metrics(&config).is_ok());
    }

    #[test]
    fn bad_address_is_rejected() {
        let config = ObservabilityConfig {
            metrics_addr: "not-an-addr".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            init_metrics(&config),
            Err(MetricsError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn recorders_do_not_panic_without_exporter() {
        record_tick_processed();
        record_trigger_fired("stop_loss");
        record_duplicate_suppressed();
        record_rebuild("ok", 0.01);
        record_incremental_update("applied");
        record_index_size(3, 2);
        record_feed_mode(FeedMode::Polling);
        record_hit_report("trade_update", "ok", 0.002);
    }
}
