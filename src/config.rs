use anyhow::{bail, Context, Result};
use url::Url;

/// Path Telegram delivers updates to. Routing between bots happens by subdomain.
pub const WEBHOOK_PATH: &str = "/webhook";

/// Runtime configuration, read from the environment once at startup.
#[derive(Clone)]
pub struct Config {
    pub bot_token: String,
    /// Public URL registered with Telegram (`WEBHOOK_HOST` + [`WEBHOOK_PATH`]).
    pub webhook_url: Url,
    /// Expected value of the `X-Telegram-Bot-Api-Secret-Token` header.
    pub webhook_secret: Option<String>,
    pub listen_host: String,
    pub listen_port: u16,
    /// Answer undecodable bodies with 200 instead of 400 so Telegram drops them.
    pub ack_malformed_updates: bool,
}

fn default_listen_host() -> String {
    "0.0.0.0".to_string()
}

fn default_listen_port() -> u16 {
    8080
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bot_token = require(&lookup, "BOT_TOKEN")?;
        let webhook_host = require(&lookup, "WEBHOOK_HOST")?;
        let webhook_url = webhook_url(&webhook_host)?;

        let webhook_secret = optional(&lookup, "WEBHOOK_SECRET");
        if let Some(secret) = &webhook_secret {
            validate_secret(secret)?;
        }

        let listen_host = optional(&lookup, "HOST").unwrap_or_else(default_listen_host);
        let listen_port = match optional(&lookup, "PORT") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("PORT must be a port number, got '{}'", raw))?,
            None => default_listen_port(),
        };

        let ack_malformed_updates = match optional(&lookup, "ACK_MALFORMED_UPDATES") {
            Some(raw) => parse_bool("ACK_MALFORMED_UPDATES", &raw)?,
            None => false,
        };

        Ok(Self {
            bot_token,
            webhook_url,
            webhook_secret,
            listen_host,
            listen_port,
            ack_malformed_updates,
        })
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("bot_token", &"<redacted>")
            .field("webhook_url", &self.webhook_url.as_str())
            .field("webhook_secret_configured", &self.webhook_secret.is_some())
            .field("listen_host", &self.listen_host)
            .field("listen_port", &self.listen_port)
            .field("ack_malformed_updates", &self.ack_malformed_updates)
            .finish()
    }
}

/// Read only the bot token. Used by commands that never serve webhooks.
pub fn bot_token_from_env() -> Result<String> {
    require(&|name: &str| std::env::var(name).ok(), "BOT_TOKEN")
}

fn require<F>(lookup: &F, name: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    match optional(lookup, name) {
        Some(value) => Ok(value),
        None => bail!("{} must be set in the environment (or .env file)", name),
    }
}

/// Blank values count as unset.
fn optional<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Join the public host with [`WEBHOOK_PATH`].
pub fn webhook_url(host: &str) -> Result<Url> {
    let raw = format!("{}{}", host.trim_end_matches('/'), WEBHOOK_PATH);
    let url = Url::parse(&raw)
        .with_context(|| format!("WEBHOOK_HOST is not a valid URL: '{}'", host))?;

    match url.scheme() {
        "https" | "http" => Ok(url),
        other => bail!("WEBHOOK_HOST must use http or https, got '{}'", other),
    }
}

/// Telegram accepts 1-256 characters from `A-Z`, `a-z`, `0-9`, `_` and `-`.
fn validate_secret(secret: &str) -> Result<()> {
    if secret.len() > 256 {
        bail!("WEBHOOK_SECRET must be at most 256 characters");
    }
    if let Some(c) = secret
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        bail!("WEBHOOK_SECRET contains unsupported character '{}'", c);
    }
    Ok(())
}

fn parse_bool(name: &str, raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => bail!("{} must be a boolean, got '{}'", name, raw),
    }
}
