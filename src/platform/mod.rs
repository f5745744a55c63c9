pub mod telegram;
#[cfg(test)]
pub mod testing;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use url::Url;

/// A message received from the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    /// Platform identifier (e.g., "telegram")
    pub platform: String,
    /// Chat the reply goes back to
    pub chat_id: i64,
    /// Sender ID, absent for channel posts
    pub user_id: Option<u64>,
    /// Display name of the sender
    pub user_name: Option<String>,
    /// The message text, `None` for stickers, photos, locations...
    pub text: Option<String>,
    /// Caption of a media message
    pub caption: Option<String>,
}

impl IncomingMessage {
    /// Where a command is looked for: the text, or the caption of media.
    pub fn command_text(&self) -> Option<&str> {
        self.text.as_deref().or(self.caption.as_deref())
    }
}

/// Snapshot of the platform-side webhook registration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebhookStatus {
    pub url: Option<String>,
    pub has_custom_certificate: bool,
    pub pending_update_count: u32,
    pub ip_address: Option<String>,
    pub last_error_date: Option<DateTime<Utc>>,
    pub last_error_message: Option<String>,
    pub max_connections: Option<u32>,
}

/// Outbound calls the bot makes to the messaging platform.
///
/// One long-lived implementation is shared by every request; implementations
/// must be safe to call concurrently.
#[async_trait]
pub trait BotApi: Send + Sync {
    /// Register `url` as the delivery target, optionally with a secret token.
    async fn set_webhook(&self, url: &Url, secret_token: Option<&str>) -> Result<()>;

    async fn delete_webhook(&self, drop_pending_updates: bool) -> Result<()>;

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()>;

    async fn webhook_info(&self) -> Result<WebhookStatus>;

    /// Username of the bot itself, used to tell `/cmd@this_bot` from
    /// commands addressed to other bots.
    async fn bot_username(&self) -> Result<Option<String>>;
}
