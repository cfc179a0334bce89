//! Monitoring loop configuration.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::trigger_watch::services::{EvaluatorConfig, SameTickPriority};

/// Accepted values for `same_tick_priority`.
const SAME_TICK_PRIORITIES: [&str; 2] = ["stop_first", "target_first"];

/// Monitoring loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Full index rebuild cadence in seconds (safety net against missed
    /// incremental updates).
    #[serde(default = "default_rebuild_interval")]
    pub rebuild_interval_secs: u64,
    /// Bound on the rebuild's persistence query before it counts as failed.
    #[serde(default = "default_rebuild_timeout")]
    pub rebuild_timeout_secs: u64,
    /// Consecutive rebuild failures before operational escalation.
    #[serde(default = "default_escalation_threshold")]
    pub rebuild_escalation_threshold: u32,
    /// Capacity of the tick input queue.
    #[serde(default = "default_tick_queue_capacity")]
    pub tick_queue_capacity: usize,
    /// Capacity of the position-change handoff queue.
    #[serde(default = "default_command_queue_capacity")]
    pub command_queue_capacity: usize,
    /// Which side wins when one tick satisfies both stop and target:
    /// `stop_first` or `target_first`.
    #[serde(default = "default_same_tick_priority")]
    pub same_tick_priority: String,
    /// Near-touch warning band in percent of the level (1.5 means 1.5%).
    /// Zero or negative disables near-touch alerts.
    #[serde(default = "default_near_alert_pct")]
    pub near_alert_pct: Decimal,
    /// Whether closing hits are reported to the trade-update collaborator.
    /// When off, hits are only delivered to the notifier.
    #[serde(default = "default_auto_close")]
    pub auto_close: bool,
    /// Bound on each downstream report call, in seconds.
    #[serde(default = "default_report_timeout")]
    pub report_timeout_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            rebuild_interval_secs: default_rebuild_interval(),
            rebuild_timeout_secs: default_rebuild_timeout(),
            rebuild_escalation_threshold: default_escalation_threshold(),
            tick_queue_capacity: default_tick_queue_capacity(),
            command_queue_capacity: default_command_queue_capacity(),
            same_tick_priority: default_same_tick_priority(),
            near_alert_pct: default_near_alert_pct(),
            auto_close: default_auto_close(),
            report_timeout_secs: default_report_timeout(),
        }
    }
}

impl MonitorConfig {
    /// Convert to the evaluator's policy type.
    ///
    /// Unknown priority strings fall back to the pessimistic default; the
    /// config validation pass rejects them before this point in normal
    /// startup.
    #[must_use]
    pub fn to_evaluator_config(&self) -> EvaluatorConfig {
        let same_tick_priority =
            parse_same_tick_priority(&self.same_tick_priority).unwrap_or_default();

        let near_alert_pct = (self.near_alert_pct > Decimal::ZERO)
            .then(|| self.near_alert_pct / Decimal::ONE_HUNDRED);

        EvaluatorConfig {
            same_tick_priority,
            near_alert_pct,
        }
    }
}

/// Parse a priority string, or return the accepted values for an error
/// message.
pub(super) fn parse_same_tick_priority(
    value: &str,
) -> Result<SameTickPriority, [&'static str; 2]> {
    match value.to_lowercase().as_str() {
        "stop_first" => Ok(SameTickPriority::StopFirst),
        "target_first" => Ok(SameTickPriority::TargetFirst),
        _ => Err(SAME_TICK_PRIORITIES),
    }
}

const fn default_rebuild_interval() -> u64 {
    60
}

const fn default_rebuild_timeout() -> u64 {
    10
}

const fn default_escalation_threshold() -> u32 {
    3
}

const fn default_tick_queue_capacity() -> usize {
    1024
}

const fn default_command_queue_capacity() -> usize {
    64
}

fn default_same_tick_priority() -> String {
    "stop_first".to_string()
}

fn default_near_alert_pct() -> Decimal {
    Decimal::new(15, 1) // 1.5%
}

const fn default_auto_close() -> bool {
    true
}

const fn default_report_timeout() -> u64 {
    10
}
