//! Application services: the monitoring loop and its rebuild scheduler.

mod health;
mod rebuild;
mod trigger_monitor;

pub use health::EngineHealth;
pub use rebuild::{IncrementalOutcome, RebuildOutcome, RebuildScheduler, apply_incremental};
pub use trigger_monitor::{EngineCommand, EngineHandle, HandoffError, TriggerMonitor};
