//! In-memory [`BotApi`] that records every outbound call.

use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;
use url::Url;

use crate::platform::{BotApi, WebhookStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    SetWebhook {
        url: String,
        secret_token: Option<String>,
    },
    DeleteWebhook {
        drop_pending_updates: bool,
    },
    SendMessage {
        chat_id: i64,
        text: String,
    },
    WebhookInfo,
    GetMe,
}

/// Username [`RecordingApi`] reports for itself.
pub const TEST_BOT_USERNAME: &str = "webhook_test_bot";

#[derive(Default)]
pub struct RecordingApi {
    calls: Mutex<Vec<ApiCall>>,
    fail: bool,
    status: WebhookStatus,
}

impl RecordingApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call is recorded, then fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn with_status(status: WebhookStatus) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().unwrap().clone()
    }

    /// `(chat_id, text)` of every sendMessage call.
    pub fn sent_messages(&self) -> Vec<(i64, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ApiCall::SendMessage { chat_id, text } => Some((chat_id, text)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: ApiCall) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        if self.fail {
            bail!("simulated platform failure");
        }
        Ok(())
    }
}

#[async_trait]
impl BotApi for RecordingApi {
    async fn set_webhook(&self, url: &Url, secret_token: Option<&str>) -> Result<()> {
        self.record(ApiCall::SetWebhook {
            url: url.to_string(),
            secret_token: secret_token.map(str::to_string),
        })
    }

    async fn delete_webhook(&self, drop_pending_updates: bool) -> Result<()> {
        self.record(ApiCall::DeleteWebhook {
            drop_pending_updates,
        })
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        self.record(ApiCall::SendMessage {
            chat_id,
            text: text.to_string(),
        })
    }

    async fn webhook_info(&self) -> Result<WebhookStatus> {
        self.record(ApiCall::WebhookInfo)?;
        Ok(self.status.clone())
    }

    async fn bot_username(&self) -> Result<Option<String>> {
        self.record(ApiCall::GetMe)?;
        Ok(Some(TEST_BOT_USERNAME.to_string()))
    }
}
