//! Price feed: streaming subscription with polling fallback.
//!
//! The feed produces one unbounded sequence of [`PriceTick`]s for every
//! instrument the trigger index currently watches. Delivery normally rides a
//! WebSocket combined stream; when the stream cannot be established or keeps
//! failing, the [`controller::FeedController`] degrades to periodic REST
//! polling and keeps retrying the stream in the background. Consumers only
//! ever see the tick channel and never care which mode produced a tick.

pub mod controller;
pub mod polling;
pub mod reconnect;
pub mod stream;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::shared::Symbol;

pub use controller::FeedController;
pub use polling::PollingClient;
pub use reconnect::ReconnectPolicy;

/// A single observed price update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceTick {
    /// Instrument the price was observed on.
    pub symbol: Symbol,
    /// Observed price.
    pub price: Decimal,
    /// Exchange event time, or receive time when the source has none.
    pub at: DateTime<Utc>,
}

/// Current delivery mode of the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedMode {
    /// Push subscription over WebSocket.
    Streaming,
    /// Periodic REST batch polling.
    Polling,
    /// Both delivery modes are failing; no ticks are flowing.
    Unavailable,
}

impl FeedMode {
    /// Stable string form for logs and metrics labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Streaming => "streaming",
            Self::Polling => "polling",
            Self::Unavailable => "unavailable",
        }
    }
}

impl std::fmt::Display for FeedMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Feed errors.
#[derive(Debug, Error)]
pub enum FeedError {
    /// The streaming connection could not be established.
    #[error("stream connect failed: {message}")]
    ConnectFailed {
        /// Error details.
        message: String,
    },

    /// The streaming connection did not come up within the configured bound.
    #[error("stream establishment timed out after {timeout_ms}ms")]
    EstablishTimeout {
        /// The configured bound.
        timeout_ms: u64,
    },

    /// The streaming connection dropped.
    #[error("stream closed: {reason}")]
    Closed {
        /// Why the stream ended.
        reason: String,
    },

    /// A frame could not be sent on the stream.
    #[error("stream send failed: {message}")]
    SendFailed {
        /// Error details.
        message: String,
    },

    /// A polling request failed.
    #[error("price poll failed: {message}")]
    Poll {
        /// Error details.
        message: String,
    },

    /// A payload could not be decoded into ticks.
    #[error("price payload decode failed: {message}")]
    Decode {
        /// Error details.
        message: String,
    },

    /// The downstream tick channel is gone; the engine has stopped.
    #[error("tick channel closed")]
    ChannelClosed,
}

/// Create the tick channel between the feed and the monitoring loop.
#[must_use]
pub fn tick_channel(capacity: usize) -> (mpsc::Sender<PriceTick>, mpsc::Receiver<PriceTick>) {
    mpsc::channel(capacity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_mode_labels() {
        assert_eq!(FeedMode::Streaming.as_str(), "streaming");
        assert_eq!(FeedMode::Polling.as_str(), "polling");
        assert_eq!(FeedMode::Unavailable.to_string(), "unavailable");
    }
}
