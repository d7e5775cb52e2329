use anyhow::Result;
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{reply_chat, send_unless_cancelled, Services};
use crate::platform::Update;
use crate::routing::{Handler, HandlerUnit, MatchRule};

/// Greets the user on `/start` and offers the demo buttons
pub struct StartCommand {
    bot: Bot,
}

fn start_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("Say Hello 👋", "hello"),
        InlineKeyboardButton::callback("Get Info ℹ️", "info"),
    ]])
}

fn welcome_text(first_name: &str) -> String {
    format!(
        "Hello, {}! 👋\n\n\
         Welcome to routebot. Every update is routed to a handler unit by its \
         declared match rules.\n\n\
         Try the buttons below or send me different types of content!",
        first_name
    )
}

#[async_trait]
impl Handler for StartCommand {
    async fn handle(&self, update: &Update, cancel: &CancellationToken) -> Result<()> {
        let chat_id = reply_chat(update)?;
        let first_name = update
            .sender()
            .map(|s| s.first_name.as_str())
            .unwrap_or("there");

        info!("User {:?} started the bot", update.sender().map(|s| s.id));

        let request = self
            .bot
            .send_message(chat_id, welcome_text(first_name))
            .reply_markup(start_keyboard());
        send_unless_cancelled(request, cancel).await?;

        Ok(())
    }
}

impl HandlerUnit<Services> for StartCommand {
    fn rules() -> Vec<MatchRule> {
        vec![MatchRule::command("/start")]
    }

    fn build(services: &Services) -> Result<Self> {
        Ok(Self {
            bot: services.bot.clone(),
        })
    }
}
