//! Bot features, one handler unit per file group.
//!
//! Every unit is listed in [`discover`]; a unit missing from that table is
//! never routed to.

pub mod callbacks;
pub mod commands;
pub mod media;
pub mod text;

use std::future::IntoFuture;

use anyhow::{Context, Result};
use teloxide::prelude::*;
use teloxide::RequestError;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::StartupError;
use crate::routing::{Container, Discovery, Registry};

/// Shared, read-only dependencies handed to every handler unit
#[derive(Clone)]
pub struct Services {
    pub bot: Bot,
}

impl Services {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

/// Registration table of every handler unit the bot ships
pub fn discover() -> Result<(Registry, Container<Services>), StartupError> {
    Discovery::<Services>::new()
        .unit::<commands::StartCommand>()
        .unit::<callbacks::HelloCallback>()
        .unit::<callbacks::InfoCallback>()
        .unit::<text::HelloText>()
        .unit::<media::StickerReply>()
        .finish()
}

/// Send a Telegram request unless the dispatch is cancelled first.
/// Returns `None` when cancelled.
pub(crate) async fn send_unless_cancelled<R, T>(
    request: R,
    cancel: &CancellationToken,
) -> Result<Option<T>>
where
    R: IntoFuture<Output = Result<T, RequestError>>,
{
    match cancel.run_until_cancelled(request.into_future()).await {
        Some(result) => Ok(Some(result.context("Telegram request failed")?)),
        None => {
            debug!("Request skipped, dispatch was cancelled");
            Ok(None)
        }
    }
}

/// Chat to reply into, or an error for updates without one
pub(crate) fn reply_chat(update: &crate::platform::Update) -> Result<ChatId> {
    update
        .chat_id()
        .map(ChatId)
        .context("Update has no chat to reply into")
}
