//! Position Repository Port (Driven Port)
//!
//! Read interface to the persistence collaborator: the open positions that
//! currently have triggers configured. The engine rebuilds its index from
//! this view and never writes through it.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::trigger_watch::PositionRecord;

/// Repository error.
#[derive(Debug, Clone, Error)]
pub enum RepositoryError {
    /// The store could not be reached.
    #[error("position store unavailable: {message}")]
    Unavailable {
        /// Error details.
        message: String,
    },

    /// The store answered with data the engine cannot use.
    #[error("malformed position data: {message}")]
    Malformed {
        /// Error details.
        message: String,
    },
}

/// Port for reading open positions with configured triggers.
#[async_trait]
pub trait PositionRepositoryPort: Send + Sync {
    /// List every open position that has at least one trigger configured.
    async fn list_open_positions_with_triggers(
        &self,
    ) -> Result<Vec<PositionRecord>, RepositoryError>;
}
