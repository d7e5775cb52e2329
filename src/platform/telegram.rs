use std::sync::Arc;

use anyhow::{Context, Result};
use teloxide::dispatching::Dispatcher as PollingDispatcher;
use teloxide::prelude::*;
use teloxide::types::{Update as TgUpdate, UpdateKind as TgUpdateKind, User};
use teloxide::update_listeners::Polling;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{
    CallbackQuery, ChosenInlineResult, Contact, FileRef, InlineQuery, Location, Message, Poll,
    PollAnswer, Sender, Sticker, Update, UpdateKind,
};
use crate::handlers::Services;
use crate::routing::Dispatcher;

/// Long-polling options for the Telegram transport
#[derive(Debug, Clone, Copy)]
pub struct PollingOptions {
    pub drop_pending_updates: bool,
}

impl From<&User> for Sender {
    fn from(user: &User) -> Self {
        Sender {
            id: user.id.0,
            first_name: user.first_name.clone(),
            username: user.username.clone(),
        }
    }
}

impl From<&teloxide::types::Message> for Message {
    fn from(msg: &teloxide::types::Message) -> Self {
        Message {
            chat_id: msg.chat.id.0,
            from: msg.from.as_ref().map(Sender::from),
            text: msg.text().map(str::to_owned),
            sticker: msg.sticker().map(|s| Sticker {
                file: FileRef::new(s.file.id.0.clone()),
                emoji: s.emoji.clone(),
                set_name: s.set_name.clone(),
            }),
            photo: msg
                .photo()
                .map(|sizes| {
                    sizes
                        .iter()
                        .map(|p| FileRef::new(p.file.id.0.clone()))
                        .collect()
                })
                .unwrap_or_default(),
            video: msg.video().map(|v| FileRef::new(v.file.id.0.clone())),
            document: msg.document().map(|d| FileRef::new(d.file.id.0.clone())),
            voice: msg.voice().map(|v| FileRef::new(v.file.id.0.clone())),
            audio: msg.audio().map(|a| FileRef::new(a.file.id.0.clone())),
            location: msg.location().map(|l| Location {
                latitude: l.latitude,
                longitude: l.longitude,
            }),
            contact: msg.contact().map(|c| Contact {
                phone_number: c.phone_number.clone(),
                first_name: c.first_name.clone(),
            }),
        }
    }
}

impl From<&TgUpdate> for Update {
    fn from(update: &TgUpdate) -> Self {
        let kind = match &update.kind {
            TgUpdateKind::Message(msg) => UpdateKind::Message(Message::from(msg)),
            TgUpdateKind::CallbackQuery(q) => UpdateKind::CallbackQuery(CallbackQuery {
                id: q.id.to_string(),
                from: Sender::from(&q.from),
                data: q.data.clone(),
                chat_id: q.message.as_ref().map(|m| m.chat().id.0),
            }),
            TgUpdateKind::InlineQuery(q) => UpdateKind::InlineQuery(InlineQuery {
                id: q.id.to_string(),
                from: Sender::from(&q.from),
                query: q.query.clone(),
            }),
            TgUpdateKind::ChosenInlineResult(r) => {
                UpdateKind::ChosenInlineResult(ChosenInlineResult {
                    result_id: r.result_id.to_string(),
                    from: Sender::from(&r.from),
                    query: r.query.clone(),
                })
            }
            TgUpdateKind::Poll(poll) => UpdateKind::Poll(Poll {
                id: poll.id.to_string(),
            }),
            TgUpdateKind::PollAnswer(answer) => UpdateKind::PollAnswer(PollAnswer {
                poll_id: answer.poll_id.to_string(),
            }),
            _ => UpdateKind::Other,
        };

        Update::new(u64::from(update.id.0), kind).with_raw(Arc::new(update.clone()))
    }
}

/// Run the Telegram long-polling loop until Ctrl-C.
///
/// Every update is handed to the router on its own; failures are contained
/// by the router and never stop the loop.
pub async fn run(
    bot: Bot,
    router: Arc<Dispatcher<Services>>,
    options: PollingOptions,
    shutdown: CancellationToken,
) -> Result<()> {
    info!("Starting Telegram platform...");

    let me = bot.get_me().await.context("Failed to call getMe")?;
    info!("Bot started: @{} ({})", me.username(), me.user.first_name);

    // Lets in-flight handlers observe shutdown while polling drains
    let ctrlc_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested, cancelling in-flight dispatches");
            ctrlc_token.cancel();
        }
    });

    let mut polling = Polling::builder(bot.clone());
    if options.drop_pending_updates {
        polling = polling.drop_pending_updates();
    }
    let listener = polling.build();

    let handler = dptree::endpoint(handle_update);

    PollingDispatcher::builder(bot, handler)
        .dependencies(dptree::deps![router, shutdown.clone()])
        .enable_ctrlc_handler()
        .build()
        .dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("An error from the update listener"),
        )
        .await;

    shutdown.cancel();
    info!("Telegram bot service is stopping");

    Ok(())
}

async fn handle_update(
    update: TgUpdate,
    router: Arc<Dispatcher<Services>>,
    shutdown: CancellationToken,
) -> ResponseResult<()> {
    router
        .dispatch(Update::from(&update), shutdown.child_token())
        .await;
    Ok(())
}
