use anyhow::Result;
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{CallbackQueryId, ParseMode};
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{reply_chat, send_unless_cancelled, Services};
use crate::platform::{Update, UpdateKind};
use crate::routing::{Handler, HandlerUnit, MatchRule};

const INFO_TEXT: &str = "ℹ️ <b>Bot Information</b>\n\n\
     This bot is built with:\n\
     • Rust and Tokio\n\
     • teloxide\n\
     • Rule-based routing\n\
     • A fresh handler instance per update\n\n\
     All handlers are registered once at startup!";

/// Callback query id, for answering the button press
fn callback_id(update: &Update) -> Option<CallbackQueryId> {
    match &update.kind {
        UpdateKind::CallbackQuery(query) => Some(CallbackQueryId(query.id.clone())),
        _ => None,
    }
}

/// Answers the "Say Hello" button
pub struct HelloCallback {
    bot: Bot,
}

#[async_trait]
impl Handler for HelloCallback {
    async fn handle(&self, update: &Update, cancel: &CancellationToken) -> Result<()> {
        let Some(query_id) = callback_id(update) else {
            return Ok(());
        };
        let first_name = update
            .sender()
            .map(|s| s.first_name.clone())
            .unwrap_or_default();

        info!("User {:?} clicked hello button", update.sender().map(|s| s.id));

        // Clears the loading state on the button
        let answer = self
            .bot
            .answer_callback_query(query_id)
            .text("Hello! 👋");
        if send_unless_cancelled(answer, cancel).await?.is_none() {
            return Ok(());
        }

        // Buttons on inaccessible messages have nowhere to reply
        let Ok(chat_id) = reply_chat(update) else {
            return Ok(());
        };
        let reply = self.bot.send_message(
            chat_id,
            format!(
                "Hello, {}! 🎉\n\n\
                 This is a callback handler response. Any callback data can be \
                 routed by declaring a callback rule on a handler unit!",
                first_name
            ),
        );
        send_unless_cancelled(reply, cancel).await?;

        Ok(())
    }
}

impl HandlerUnit<Services> for HelloCallback {
    fn rules() -> Vec<MatchRule> {
        vec![MatchRule::callback("hello")]
    }

    fn build(services: &Services) -> Result<Self> {
        Ok(Self {
            bot: services.bot.clone(),
        })
    }
}

/// Answers the "Get Info" button with an HTML summary
pub struct InfoCallback {
    bot: Bot,
}

#[async_trait]
impl Handler for InfoCallback {
    async fn handle(&self, update: &Update, cancel: &CancellationToken) -> Result<()> {
        let Some(query_id) = callback_id(update) else {
            return Ok(());
        };

        info!("User {:?} requested info", update.sender().map(|s| s.id));

        let answer = self.bot.answer_callback_query(query_id);
        if send_unless_cancelled(answer, cancel).await?.is_none() {
            return Ok(());
        }

        let Ok(chat_id) = reply_chat(update) else {
            return Ok(());
        };
        let reply = self
            .bot
            .send_message(chat_id, INFO_TEXT)
            .parse_mode(ParseMode::Html);
        send_unless_cancelled(reply, cancel).await?;

        Ok(())
    }
}

impl HandlerUnit<Services> for InfoCallback {
    fn rules() -> Vec<MatchRule> {
        vec![MatchRule::callback("info")]
    }

    fn build(services: &Services) -> Result<Self> {
        Ok(Self {
            bot: services.bot.clone(),
        })
    }
}
