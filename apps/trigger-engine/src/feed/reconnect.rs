//! Reconnection policy with exponential backoff and jitter.

use std::time::Duration;

use rand::Rng;

use crate::config::BinanceFeedConfig;

/// Exponential backoff with full jitter for stream reconnects.
///
/// Each attempt sleeps a uniformly random duration between zero and the
/// capped exponential bound, which spreads reconnect storms across clients.
#[derive(Debug)]
pub struct ReconnectPolicy {
    initial_backoff: Duration,
    max_backoff: Duration,
    multiplier: f64,
    max_attempts: u32,
    attempt: u32,
}

impl ReconnectPolicy {
    /// Build the policy from feed configuration.
    #[must_use]
    pub const fn new(config: &BinanceFeedConfig) -> Self {
        Self::with_params(
            Duration::from_millis(config.initial_backoff_ms),
            Duration::from_secs(config.max_backoff_secs),
            config.backoff_multiplier,
            config.max_reconnect_attempts,
        )
    }

    /// Build the policy with explicit parameters.
    #[must_use]
    pub const fn with_params(
        initial_backoff: Duration,
        max_backoff: Duration,
        multiplier: f64,
        max_attempts: u32,
    ) -> Self {
        Self {
            initial_backoff,
            max_backoff,
            multiplier,
            max_attempts,
            attempt: 0,
        }
    }

    /// Next backoff duration, or `None` once attempts are exhausted and the
    /// feed should degrade to polling.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn next_backoff(&mut self) -> Option<Duration> {
        if self.attempt >= self.max_attempts {
            return None;
        }

        let base_ms = self.initial_backoff.as_millis() as f64;
        let exponential = base_ms
            * self
                .multiplier
                .powi(i32::try_from(self.attempt).unwrap_or(i32::MAX));
        let capped = exponential.min(self.max_backoff.as_millis() as f64);

        let jitter_ms = if capped > 0.0 {
            rand::rng().random_range(0.0..capped)
        } else {
            0.0
        };

        self.attempt += 1;
        Some(Duration::from_millis(jitter_ms as u64))
    }

    /// Reset after a successful connection.
    pub const fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Attempts made since the last reset.
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Whether another reconnect attempt is allowed.
    #[must_use]
    pub const fn exhausted(&self) -> bool {
        self.attempt >= self.max_attempts
    }
}
