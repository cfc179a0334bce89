//! Engine health snapshot for external monitoring.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::feed::FeedMode;

/// Operational signal published by the monitoring loop.
///
/// Served as JSON by the health endpoint; consumers alert on stale rebuilds,
/// degraded feed mode, or growing failure counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineHealth {
    /// When the last successful full rebuild finished.
    pub last_rebuild_at: Option<DateTime<Utc>>,
    /// Whether the most recent rebuild cycle succeeded.
    pub rebuild_ok: bool,
    /// Consecutive failed rebuild cycles.
    pub consecutive_rebuild_failures: u32,
    /// Current price feed delivery mode.
    pub feed_mode: FeedMode,
    /// Exchange time of the last processed tick.
    pub last_tick_at: Option<DateTime<Utc>>,
    /// Number of triggers currently indexed.
    pub active_triggers: usize,
    /// Number of instruments currently watched.
    pub watched_symbols: usize,
}

impl EngineHealth {
    /// Initial snapshot before the first rebuild.
    #[must_use]
    pub const fn starting(feed_mode: FeedMode) -> Self {
        Self {
            last_rebuild_at: None,
            rebuild_ok: true,
            consecutive_rebuild_failures: 0,
            feed_mode,
            last_tick_at: None,
            active_triggers: 0,
            watched_symbols: 0,
        }
    }
}
