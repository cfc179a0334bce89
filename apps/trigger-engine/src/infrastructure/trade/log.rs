//! Log-only trade-update adapter.

use async_trait::async_trait;

use crate::application::ports::{TradeUpdateError, TradeUpdatePort};
use crate::domain::trigger_watch::TriggerHit;

/// Trade-update adapter that only logs the report.
///
/// Used when the engine runs without a position lifecycle owner attached
/// (alerting-only deployments).
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTradeUpdate;

impl LogTradeUpdate {
    /// Create the adapter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TradeUpdatePort for LogTradeUpdate {
    async fn report_trigger_hit(&self, hit: &TriggerHit) -> Result<(), TradeUpdateError> {
        tracing::info!(
            event_id = %hit.event_id,
            position = %hit.position_ref,
            kind = %hit.kind,
            price = %hit.price,
            at = %hit.at,
            "trigger hit reported"
        );
        Ok(())
    }
}
