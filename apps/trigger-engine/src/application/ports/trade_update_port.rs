//! Trade Update Port (Driven Port)
//!
//! The collaborator that closes or adjusts a position when one of its
//! triggers fires. The engine reports each hit at most once and does not
//! re-fire on downstream failure; retries are this collaborator's policy.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::trigger_watch::TriggerHit;

/// Trade update error.
#[derive(Debug, Clone, Error)]
pub enum TradeUpdateError {
    /// The collaborator could not be reached.
    #[error("trade update collaborator unreachable: {message}")]
    Unreachable {
        /// Error details.
        message: String,
    },

    /// The collaborator rejected the report.
    #[error("trigger hit report rejected: {message}")]
    Rejected {
        /// Error details.
        message: String,
    },
}

/// Port for reporting fired triggers to the position lifecycle owner.
#[async_trait]
pub trait TradeUpdatePort: Send + Sync {
    /// Report a fired trigger so the owning position can be closed or
    /// adjusted.
    async fn report_trigger_hit(&self, hit: &TriggerHit) -> Result<(), TradeUpdateError>;
}
