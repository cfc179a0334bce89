//! Notification delivery configuration.

use serde::{Deserialize, Serialize};

/// Notification delivery configuration.
///
/// With no channel configured, hit events are only logged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Telegram bot delivery, if configured.
    #[serde(default)]
    pub telegram: Option<TelegramConfig>,
}

/// Telegram bot API delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token (from environment, e.g. `${TELEGRAM_BOT_TOKEN}`).
    pub bot_token: String,
    /// Chat the alerts are delivered to.
    pub chat_id: String,
    /// Bot API base URL; overridable for tests.
    #[serde(default = "default_api_url")]
    pub api_url: String,
}

fn default_api_url() -> String {
    "https://api.telegram.org".to_string()
}
