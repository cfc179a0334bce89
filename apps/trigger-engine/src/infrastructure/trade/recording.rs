//! Recording trade-update adapter for tests and embedders.

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::application::ports::{TradeUpdateError, TradeUpdatePort};
use crate::domain::trigger_watch::TriggerHit;

/// Trade-update adapter that stores every reported hit in memory.
#[derive(Debug, Default)]
pub struct RecordingTradeUpdate {
    reported: Mutex<Vec<TriggerHit>>,
    fail_with: Mutex<Option<String>>,
}

impl RecordingTradeUpdate {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of reported hits, in report order.
    #[must_use]
    pub fn reported(&self) -> Vec<TriggerHit> {
        self.reported.lock().clone()
    }

    /// Number of reported hits.
    #[must_use]
    pub fn len(&self) -> usize {
        self.reported.lock().len()
    }

    /// Whether nothing was reported yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reported.lock().is_empty()
    }

    /// Make subsequent reports fail with the given message.
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.fail_with.lock() = Some(message.into());
    }
}

#[async_trait]
impl TradeUpdatePort for RecordingTradeUpdate {
    async fn report_trigger_hit(&self, hit: &TriggerHit) -> Result<(), TradeUpdateError> {
        if let Some(message) = self.fail_with.lock().clone() {
            return Err(TradeUpdateError::Unreachable { message });
        }
        self.reported.lock().push(hit.clone());
        Ok(())
    }
}
