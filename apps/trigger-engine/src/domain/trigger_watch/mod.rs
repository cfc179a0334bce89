//! Trigger Watch Bounded Context
//!
//! Projects open positions into price triggers (stop-loss, take-profit,
//! trailing-stop), indexes them per instrument for fast tick lookups, and
//! decides which triggers a tick satisfies. Firing a trigger at most once is
//! the job of the fired-marker set, which outlives index rebuilds.

pub mod errors;
pub mod services;
pub mod value_objects;

pub use errors::TriggerWatchError;
pub use services::{
    EvaluatorConfig, FiredMarkers, SameTickPriority, TriggerEvaluator, TriggerIndex, UpsertOutcome,
};
pub use value_objects::{
    ChangeKind, FiredMarker, HitKind, PositionChange, PositionRecord, PositionSide,
    TrailingStopSpec, Trigger, TriggerHit, TriggerId, TriggerKind, TriggerTag,
};
