//! Webhook registration around the serving window.
//!
//! Startup clears any previous registration (dropping updates queued for it),
//! registers the configured URL and looks up the bot's own username. Shutdown
//! removes the registration and releases the platform client.

use std::fmt::Write;
use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::platform::{BotApi, WebhookStatus};

/// Register the webhook and return the bot's username, if it could be
/// fetched. Failures are logged and never stop the process.
pub async fn on_startup(api: &dyn BotApi, config: &Config) -> Option<String> {
    if let Err(e) = api.delete_webhook(true).await {
        warn!("Failed to delete previous webhook: {:#}", e);
    }

    match api
        .set_webhook(&config.webhook_url, config.webhook_secret.as_deref())
        .await
    {
        Ok(()) => info!(
            "Webhook set to {} (secret token: {})",
            config.webhook_url,
            if config.webhook_secret.is_some() {
                "enabled"
            } else {
                "disabled"
            }
        ),
        Err(e) => error!(
            "CRITICAL: failed to set webhook to {}: {:#}",
            config.webhook_url, e
        ),
    }

    match api.bot_username().await {
        Ok(Some(username)) => {
            info!("Running as @{}", username);
            Some(username)
        }
        Ok(None) => {
            warn!("Bot has no username; accepting commands addressed to any bot");
            None
        }
        Err(e) => {
            warn!(
                "Failed to fetch bot username, accepting commands addressed to any bot: {:#}",
                e
            );
            None
        }
    }
}

/// Deregister the webhook and drop the platform client.
pub async fn on_shutdown(api: Arc<dyn BotApi>) {
    match api.delete_webhook(false).await {
        Ok(()) => info!("Webhook deleted"),
        Err(e) => error!("Failed to delete webhook on shutdown: {:#}", e),
    }

    drop(api);
    info!("Bot session released");
}

/// Human-readable report of the current webhook registration.
pub async fn webhook_info_report(api: &dyn BotApi) -> Result<String> {
    let status = api.webhook_info().await?;
    Ok(format_webhook_status(&status))
}

pub fn format_webhook_status(status: &WebhookStatus) -> String {
    let mut out = String::from("Webhook info:\n");
    let _ = writeln!(out, "  url: {}", status.url.as_deref().unwrap_or("<not set>"));
    let _ = writeln!(out, "  pending updates: {}", status.pending_update_count);
    let _ = writeln!(
        out,
        "  custom certificate: {}",
        if status.has_custom_certificate { "yes" } else { "no" }
    );
    if let Some(ip) = &status.ip_address {
        let _ = writeln!(out, "  ip address: {}", ip);
    }
    if let Some(max) = status.max_connections {
        let _ = writeln!(out, "  max connections: {}", max);
    }
    match (&status.last_error_date, &status.last_error_message) {
        (None, None) => out.push_str("  last error: none\n"),
        (date, message) => {
            let when = date
                .map(|d| d.to_rfc3339())
                .unwrap_or_else(|| "unknown time".to_string());
            let _ = writeln!(
                out,
                "  last error: {} ({})",
                message.as_deref().unwrap_or("no message"),
                when
            );
        }
    }
    out
}
