//! Trigger watch value objects.

mod hit;
mod position;
mod trigger;

pub use hit::{FiredMarker, HitKind, TriggerHit};
pub use position::{ChangeKind, PositionChange, PositionRecord, TrailingStopSpec};
pub use trigger::{PositionSide, Trigger, TriggerId, TriggerKind, TriggerTag};
