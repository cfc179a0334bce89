//! Trigger watch errors.

use thiserror::Error;

use super::value_objects::TriggerId;

/// Errors raised by the trigger index and evaluator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TriggerWatchError {
    /// The referenced trigger is not present in the index.
    #[error("unknown trigger: {id}")]
    UnknownTrigger {
        /// The missing trigger id.
        id: TriggerId,
    },

    /// A trailing-stop adjustment was requested for a fixed trigger.
    #[error("trigger {id} is not a trailing stop")]
    NotTrailing {
        /// The offending trigger id.
        id: TriggerId,
    },
}
