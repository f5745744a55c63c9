use std::collections::HashMap;

use anyhow::Result;
use teloxide::types::Update;
use tracing::{debug, info};

use crate::platform::telegram::incoming_message;
use crate::platform::{BotApi, IncomingMessage};

/// Reply to `/start`.
pub const GREETING: &str = "Hello! I'm running on webhooks.";

/// Stands in for the text of stickers, photos and other non-text messages.
pub const NON_TEXT_PLACEHOLDER: &str = "<non-text>";

/// The message handlers the bot knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    /// Fixed greeting
    Greeting,
    /// Repeat the received text back
    Echo,
}

impl Handler {
    /// Text of the single reply this handler sends for `msg`.
    pub fn reply(self, msg: &IncomingMessage) -> String {
        match self {
            Handler::Greeting => GREETING.to_string(),
            Handler::Echo => {
                let text = msg.text.as_deref().unwrap_or(NON_TEXT_PLACEHOLDER);
                format!("You wrote: {}", text)
            }
        }
    }
}

/// Handlers keyed by command name (without the leading `/`), plus the
/// handler used for everything else.
#[derive(Debug, Clone)]
pub struct HandlerTable {
    commands: HashMap<String, Handler>,
    fallback: Handler,
}

impl HandlerTable {
    pub fn new(fallback: Handler) -> Self {
        Self {
            commands: HashMap::new(),
            fallback,
        }
    }

    pub fn with_command(mut self, name: &str, handler: Handler) -> Self {
        self.commands.insert(name.to_string(), handler);
        self
    }

    /// Pick the handler for the text (or caption) of a message.
    ///
    /// Commands mentioning another bot fall through to the fallback. When
    /// `bot_username` is unknown every mention is accepted.
    pub fn resolve(&self, command_text: Option<&str>, bot_username: Option<&str>) -> Handler {
        command_text
            .and_then(parse_command)
            .filter(|cmd| cmd.is_addressed_to(bot_username))
            .and_then(|cmd| self.commands.get(cmd.name))
            .copied()
            .unwrap_or(self.fallback)
    }
}

impl Default for HandlerTable {
    fn default() -> Self {
        Self::new(Handler::Echo).with_command("start", Handler::Greeting)
    }
}

/// A `/command` at the start of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BotCommand<'a> {
    pub name: &'a str,
    /// Bot named after `@`, as in `/start@my_bot`
    pub mention: Option<&'a str>,
}

impl BotCommand<'_> {
    pub fn is_addressed_to(&self, bot_username: Option<&str>) -> bool {
        match (self.mention, bot_username) {
            (Some(mention), Some(username)) => {
                mention.eq_ignore_ascii_case(username.trim_start_matches('@'))
            }
            _ => true,
        }
    }
}

/// Parse the command `text` starts with, if any.
pub fn parse_command(text: &str) -> Option<BotCommand<'_>> {
    let token = text.split_whitespace().next()?;
    let command = token.strip_prefix('/')?;
    let (name, mention) = match command.split_once('@') {
        Some((name, mention)) => (name, Some(mention)),
        None => (command, None),
    };
    if name.is_empty() {
        None
    } else {
        Some(BotCommand { name, mention })
    }
}

/// Route one message to its handler and send the reply.
pub async fn handle_message(
    api: &dyn BotApi,
    handlers: &HandlerTable,
    bot_username: Option<&str>,
    msg: &IncomingMessage,
) -> Result<Handler> {
    let handler = handlers.resolve(msg.command_text(), bot_username);

    info!(
        "[{}] Message from {} ({:?}) in chat {}: {:?} -> {:?}",
        msg.platform,
        msg.user_name.as_deref().unwrap_or("unknown"),
        msg.user_id,
        msg.chat_id,
        msg.text,
        handler
    );

    api.send_message(msg.chat_id, &handler.reply(msg)).await?;
    Ok(handler)
}

/// Dispatch a decoded update. Updates that carry no message are skipped and
/// give `Ok(None)`.
pub async fn dispatch(
    api: &dyn BotApi,
    handlers: &HandlerTable,
    bot_username: Option<&str>,
    update: &Update,
) -> Result<Option<Handler>> {
    match incoming_message(update) {
        Some(msg) => handle_message(api, handlers, bot_username, &msg)
            .await
            .map(Some),
        None => {
            debug!("Unhandled update: {:?}", update.id);
            Ok(None)
        }
    }
}
