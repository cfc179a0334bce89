// Allow unwrap/expect in tests - tests should panic on unexpected errors
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! Trigger Engine - Price-Trigger Monitoring Core
//!
//! Watches live market prices against the stop-loss / take-profit /
//! trailing-stop levels of open positions and fires each satisfied trigger
//! exactly once.
//!
//! # Architecture
//!
//! - **Domain**: trigger projection, the per-instrument trigger index, tick
//!   evaluation, and fired-event deduplication (`domain::trigger_watch`).
//! - **Application**: ports for the persistence, trade-update, and
//!   notification collaborators, plus the single-owner monitoring loop and
//!   its rebuild scheduler (`application`).
//! - **Feed**: the streaming price subscription with reconnect backoff and
//!   the REST polling fallback (`feed`).
//! - **Infrastructure**: adapters (in-memory persistence, log/Telegram
//!   notifiers, the operational health endpoint).
//!
//! All engine state lives inside the monitoring loop's task. Other contexts
//! hand work off through [`EngineHandle`] messages; nothing mutates the
//! index or the markers from outside.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

/// Domain layer - Core business logic with no external I/O dependencies.
pub mod domain;

/// Application layer - Engine services and port definitions.
pub mod application;

/// Configuration loading and validation.
pub mod config;

/// Price feed: streaming subscription with polling fallback.
pub mod feed;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

/// Observability: logging, tracing export, and metrics.
pub mod observability;

// =============================================================================
// Re-exports
// =============================================================================

// Domain re-exports
pub use domain::shared::{PositionId, Symbol};
pub use domain::trigger_watch::{
    ChangeKind, FiredMarkers, HitKind, PositionChange, PositionRecord, PositionSide,
    TrailingStopSpec, Trigger, TriggerEvaluator, TriggerHit, TriggerId, TriggerIndex, TriggerKind,
};

// Application re-exports
pub use application::ports::{
    NotifierPort, NotifyError, PositionRepositoryPort, RepositoryError, TradeUpdateError,
    TradeUpdatePort,
};
pub use application::services::{EngineHandle, EngineHealth, TriggerMonitor};

// Feed re-exports
pub use feed::{FeedController, FeedMode, PriceTick};

// Infrastructure re-exports
pub use infrastructure::notify::{LogNotifier, RecordingNotifier, TelegramNotifier};
pub use infrastructure::persistence::InMemoryPositionRepository;
pub use infrastructure::trade::{LogTradeUpdate, RecordingTradeUpdate};
