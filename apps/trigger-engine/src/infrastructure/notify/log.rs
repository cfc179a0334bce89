//! Log-only notifier.

use async_trait::async_trait;

use crate::application::ports::{NotifierPort, NotifyError};
use crate::domain::trigger_watch::TriggerHit;

/// Notifier that writes hit events to the log.
///
/// The default delivery channel when no external channel is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl LogNotifier {
    /// Create a log notifier.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotifierPort for LogNotifier {
    async fn notify_hit(&self, hit: &TriggerHit) -> Result<(), NotifyError> {
        tracing::info!(
            event_id = %hit.event_id,
            position = %hit.position_ref,
            symbol = %hit.symbol,
            kind = %hit.kind,
            threshold = %hit.threshold,
            price = %hit.price,
            "hit notification"
        );
        Ok(())
    }
}
