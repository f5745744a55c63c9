use anyhow::{Context, Result};
use async_trait::async_trait;
use teloxide::payloads::setters::*;
use teloxide::prelude::*;
use teloxide::types::{ChatId, UpdateKind};
use tracing::debug;
use url::Url;

use crate::platform::{BotApi, IncomingMessage, WebhookStatus};

/// Telegram rejects messages longer than 4096 UTF-16 code units.
pub const MAX_MESSAGE_LEN: usize = 4096;

/// Cut `text` so it fits in a single Telegram message.
pub fn truncate_message(text: &str, max_len: usize) -> &str {
    let mut units = 0;
    for (idx, c) in text.char_indices() {
        units += c.len_utf16();
        if units > max_len {
            return &text[..idx];
        }
    }
    text
}

/// Decode a raw webhook body into a teloxide update.
///
/// Decodes straight from the bytes: teloxide's `Update` does not survive a
/// round trip through `serde_json::Value`, every kind comes out as
/// `UpdateKind::Error`. Use [`serde_json::Error::classify`] to tell broken
/// JSON from JSON that is not an update.
pub fn parse_update(body: &[u8]) -> serde_json::Result<Update> {
    serde_json::from_slice(body)
}

/// Extract the message carried by an update. Other update kinds
/// (edited messages, callback queries, ...) yield `None`.
pub fn incoming_message(update: &Update) -> Option<IncomingMessage> {
    let UpdateKind::Message(msg) = &update.kind else {
        return None;
    };

    let user = msg.from.as_ref();
    Some(IncomingMessage {
        platform: "telegram".to_string(),
        chat_id: msg.chat.id.0,
        user_id: user.map(|u| u.id.0),
        user_name: user.map(|u| u.first_name.clone()),
        text: msg.text().map(str::to_string),
        caption: msg.caption().map(str::to_string),
    })
}

/// [`BotApi`] backed by the Telegram Bot API.
pub struct TelegramApi {
    bot: Bot,
}

impl TelegramApi {
    pub fn new(token: &str) -> Self {
        Self {
            bot: Bot::new(token),
        }
    }
}

#[async_trait]
impl BotApi for TelegramApi {
    async fn set_webhook(&self, url: &Url, secret_token: Option<&str>) -> Result<()> {
        let mut request = self.bot.set_webhook(url.clone());
        if let Some(secret) = secret_token {
            request = request.secret_token(secret.to_string());
        }
        request.await.context("setWebhook failed")?;
        Ok(())
    }

    async fn delete_webhook(&self, drop_pending_updates: bool) -> Result<()> {
        self.bot
            .delete_webhook()
            .drop_pending_updates(drop_pending_updates)
            .await
            .context("deleteWebhook failed")?;
        Ok(())
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let text = truncate_message(text, MAX_MESSAGE_LEN);
        debug!("Sending {} chars to chat {}", text.chars().count(), chat_id);
        self.bot
            .send_message(ChatId(chat_id), text)
            .await
            .with_context(|| format!("sendMessage to chat {} failed", chat_id))?;
        Ok(())
    }

    async fn webhook_info(&self) -> Result<WebhookStatus> {
        let info = self
            .bot
            .get_webhook_info()
            .await
            .context("getWebhookInfo failed")?;

        Ok(WebhookStatus {
            url: info.url.map(|u| u.to_string()),
            has_custom_certificate: info.has_custom_certificate,
            pending_update_count: info.pending_update_count.into(),
            ip_address: info.ip_address.map(|ip| ip.to_string()),
            last_error_date: info.last_error_date,
            last_error_message: info.last_error_message,
            max_connections: info.max_connections.map(u32::from),
        })
    }

    async fn bot_username(&self) -> Result<Option<String>> {
        let me = self.bot.get_me().await.context("getMe failed")?;
        Ok(me.user.username)
    }
}
