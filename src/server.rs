//! HTTP surface: the Telegram webhook endpoint and liveness probes.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::error::Category;
use tokio::{net::TcpListener, signal};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::bot::{self, HandlerTable};
use crate::config::{Config, WEBHOOK_PATH};
use crate::lifecycle;
use crate::platform::telegram::parse_update;
use crate::platform::BotApi;

/// Header Telegram uses to echo the secret token given to `setWebhook`.
pub const SECRET_TOKEN_HEADER: &str = "X-Telegram-Bot-Api-Secret-Token";

/// Shared application state, built once in `main`.
#[derive(Clone)]
pub struct AppState {
    pub api: Arc<dyn BotApi>,
    pub handlers: Arc<HandlerTable>,
    pub config: Arc<Config>,
    /// Our own username, for `/cmd@username` matching.
    pub bot_username: Option<Arc<str>>,
}

impl AppState {
    pub fn new(config: Config, api: Arc<dyn BotApi>) -> Self {
        Self {
            api,
            handlers: Arc::new(HandlerTable::default()),
            config: Arc::new(config),
            bot_username: None,
        }
    }

    pub fn with_bot_username(mut self, username: Option<String>) -> Self {
        self.bot_username = username.map(Arc::from);
        self
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route(WEBHOOK_PATH, post(webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind, register the webhook, serve until a shutdown signal, then
/// deregister.
pub async fn run(config: Config, api: Arc<dyn BotApi>) -> Result<()> {
    let listener = TcpListener::bind((config.listen_host.as_str(), config.listen_port))
        .await
        .with_context(|| {
            format!(
                "Failed to bind to {}:{}",
                config.listen_host, config.listen_port
            )
        })?;
    info!(
        "Listening on {}:{}",
        config.listen_host, config.listen_port
    );

    let bot_username = lifecycle::on_startup(api.as_ref(), &config).await;

    let app = router(AppState::new(config, api.clone()).with_bot_username(bot_username));
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    lifecycle::on_shutdown(api).await;
    served.context("Server error")
}

async fn root() -> &'static str {
    "tg-webhook-bot: ok"
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Telegram webhook endpoint.
///
/// Everything past JSON decoding is acknowledged with 200, so Telegram never
/// redelivers an update we already saw.
async fn webhook(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    if let Some(expected) = state.config.webhook_secret.as_deref() {
        let provided = headers
            .get(SECRET_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok());
        if !secret_matches(provided, expected) {
            warn!(
                "Rejected webhook delivery: secret token {}",
                if provided.is_some() { "mismatch" } else { "missing" }
            );
            return StatusCode::UNAUTHORIZED.into_response();
        }
    }

    let update = match parse_update(&body) {
        Ok(update) => update,
        Err(e) if e.classify() == Category::Data => {
            warn!("Dropping JSON that is not an update: {}", e);
            return StatusCode::OK.into_response();
        }
        Err(e) => {
            warn!("Invalid JSON in webhook body ({} bytes): {}", body.len(), e);
            if state.config.ack_malformed_updates {
                return StatusCode::OK.into_response();
            }
            return (StatusCode::BAD_REQUEST, "invalid json").into_response();
        }
    };

    if let Err(e) = bot::dispatch(
        state.api.as_ref(),
        &state.handlers,
        state.bot_username.as_deref(),
        &update,
    )
    .await
    {
        error!("Error processing update {:?}: {:#}", update.id, e);
    }

    StatusCode::OK.into_response()
}

/// Check the secret header against the configured token. Equal-length
/// values are compared in constant time.
fn secret_matches(provided: Option<&str>, expected: &str) -> bool {
    let Some(provided) = provided else {
        return false;
    };
    provided.len() == expected.len()
        && provided
            .bytes()
            .zip(expected.bytes())
            .fold(0u8, |diff, (a, b)| diff | (a ^ b))
            == 0
}

/// Completes on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("Shutting down...");
}
