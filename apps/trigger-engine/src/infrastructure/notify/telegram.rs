//! Telegram bot notifier.
//!
//! Thin adapter over the Bot API `sendMessage` call. Delivery failures are
//! surfaced as errors for the caller to log; the engine never retries them.

use async_trait::async_trait;
use std::time::Duration;

use crate::application::ports::{NotifierPort, NotifyError};
use crate::config::TelegramConfig;
use crate::domain::trigger_watch::{HitKind, TriggerHit};

/// Per-request timeout for Bot API calls.
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Notifier that posts hit events to a Telegram chat.
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    http: reqwest::Client,
    config: TelegramConfig,
}

impl TelegramNotifier {
    /// Create a notifier from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Unreachable`] if the HTTP client cannot be
    /// built.
    pub fn new(config: TelegramConfig) -> Result<Self, NotifyError> {
        let http = reqwest::Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .map_err(|e| NotifyError::Unreachable {
                message: e.to_string(),
            })?;

        Ok(Self { http, config })
    }

    fn format_message(hit: &TriggerHit) -> String {
        let headline = match hit.kind {
            HitKind::StopLoss => "Stop-loss hit",
            HitKind::TakeProfit => "Take-profit hit",
            HitKind::TrailingStop => "Trailing stop hit",
            HitKind::NearStopLoss => "Price approaching stop-loss",
            HitKind::NearTakeProfit => "Price approaching take-profit",
        };

        format!(
            "{headline}\n#{symbol} position {position}\nlevel {threshold}, price {price}",
            symbol = hit.symbol,
            position = hit.position_ref,
            threshold = hit.threshold,
            price = hit.price,
        )
    }
}

#[async_trait]
impl NotifierPort for TelegramNotifier {
    async fn notify_hit(&self, hit: &TriggerHit) -> Result<(), NotifyError> {
        let url = format!(
            "{}/bot{}/sendMessage",
            self.config.api_url, self.config.bot_token
        );

        let body = serde_json::json!({
            "chat_id": self.config.chat_id,
            "text": Self::format_message(hit),
        });

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| NotifyError::Unreachable {
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(NotifyError::Rejected {
                message: format!("bot API returned {}", response.status()),
            });
        }

        Ok(())
    }
}
