use thiserror::Error;

use crate::routing::HandlerId;

/// Failures contained at the dispatch boundary of a single update.
/// None of these stop the receive loop.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no handler found for {0}")]
    NoRoute(String),

    #[error("failed to create handler instance for {handler}: {cause:#}")]
    Resolution {
        handler: HandlerId,
        cause: anyhow::Error,
    },

    #[error("handler {handler} failed: {cause:#}")]
    Handler {
        handler: HandlerId,
        cause: anyhow::Error,
    },

    #[error("handler {handler} panicked: {message}")]
    Panic { handler: HandlerId, message: String },
}

impl DispatchError {
    /// Handler unit involved in the failure, if one was resolved
    pub fn handler(&self) -> Option<HandlerId> {
        match self {
            DispatchError::NoRoute(_) => None,
            DispatchError::Resolution { handler, .. }
            | DispatchError::Handler { handler, .. }
            | DispatchError::Panic { handler, .. } => Some(*handler),
        }
    }
}

/// Fatal errors raised while the bot is starting up
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Telegram bot token is not configured (set telegram.bot_token or TELEGRAM_BOT_TOKEN)")]
    MissingToken,

    #[error("no handler units were registered")]
    NoHandlers,
}
