//! Notifier Port (Driven Port)
//!
//! User-facing delivery of hit events. Fire-and-forget with at-least-once
//! semantics: the engine logs delivery failures and moves on.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::trigger_watch::TriggerHit;

/// Notification delivery error.
#[derive(Debug, Clone, Error)]
pub enum NotifyError {
    /// The delivery channel could not be reached.
    #[error("notification channel unreachable: {message}")]
    Unreachable {
        /// Error details.
        message: String,
    },

    /// The channel refused the message.
    #[error("notification rejected: {message}")]
    Rejected {
        /// Error details.
        message: String,
    },
}

/// Port for delivering hit events to users.
#[async_trait]
pub trait NotifierPort: Send + Sync {
    /// Deliver a hit event notification.
    async fn notify_hit(&self, hit: &TriggerHit) -> Result<(), NotifyError>;
}
