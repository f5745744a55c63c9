mod bot;
mod config;
mod lifecycle;
mod platform;
mod server;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::platform::telegram::TelegramApi;
use crate::platform::BotApi;

/// Telegram bot that receives updates through a webhook.
#[derive(Parser)]
#[command(name = "tg-webhook-bot", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Register the webhook and serve updates (default)
    Serve,
    /// Print the current webhook registration and exit
    WebhookInfo,
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine; the variables may come from the environment.
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tg_webhook_bot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let config = Config::from_env().context("Failed to load configuration")?;

            info!("Configuration loaded successfully");
            info!("  Webhook URL: {}", config.webhook_url);
            info!(
                "  Secret token: {}",
                if config.webhook_secret.is_some() {
                    "configured"
                } else {
                    "not configured"
                }
            );
            info!(
                "  Malformed updates: {}",
                if config.ack_malformed_updates {
                    "acknowledged"
                } else {
                    "rejected"
                }
            );

            let api: Arc<dyn BotApi> = Arc::new(TelegramApi::new(&config.bot_token));

            info!("Bot is starting...");
            server::run(config, api).await
        }
        Command::WebhookInfo => {
            let token = config::bot_token_from_env().context("Failed to load configuration")?;
            let api = TelegramApi::new(&token);
            let report = lifecycle::webhook_info_report(&api).await?;
            println!("{}", report);
            Ok(())
        }
    }
}
