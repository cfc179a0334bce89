//! Recording notifier for tests and embedders.

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::application::ports::{NotifierPort, NotifyError};
use crate::domain::trigger_watch::TriggerHit;

/// Notifier that stores every delivered hit in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    delivered: Mutex<Vec<TriggerHit>>,
}

impl RecordingNotifier {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of delivered hits, in delivery order.
    #[must_use]
    pub fn delivered(&self) -> Vec<TriggerHit> {
        self.delivered.lock().clone()
    }

    /// Number of delivered hits.
    #[must_use]
    pub fn len(&self) -> usize {
        self.delivered.lock().len()
    }

    /// Whether nothing was delivered yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.delivered.lock().is_empty()
    }
}

#[async_trait]
impl NotifierPort for RecordingNotifier {
    async fn notify_hit(&self, hit: &TriggerHit) -> Result<(), NotifyError> {
        self.delivered.lock().push(hit.clone());
        Ok(())
    }
}
