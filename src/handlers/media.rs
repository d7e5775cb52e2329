use anyhow::Result;
use async_trait::async_trait;
use teloxide::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{reply_chat, send_unless_cancelled, Services};
use crate::platform::{Sticker, Update, UpdateKind};
use crate::routing::{Handler, HandlerUnit, MatchRule, UnaryKind};

/// Describes stickers sent to the bot
pub struct StickerReply {
    bot: Bot,
}

fn describe(sticker: &Sticker) -> String {
    format!(
        "Cool sticker! 😎\nSticker emoji: {}\nSet name: {}",
        sticker.emoji.as_deref().unwrap_or("N/A"),
        sticker.set_name.as_deref().unwrap_or("N/A")
    )
}

#[async_trait]
impl Handler for StickerReply {
    async fn handle(&self, update: &Update, cancel: &CancellationToken) -> Result<()> {
        let UpdateKind::Message(message) = &update.kind else {
            return Ok(());
        };
        let Some(sticker) = &message.sticker else {
            return Ok(());
        };
        let chat_id = reply_chat(update)?;

        info!("User {:?} sent a sticker", update.sender().map(|s| s.id));

        send_unless_cancelled(self.bot.send_message(chat_id, describe(sticker)), cancel).await?;

        Ok(())
    }
}

impl HandlerUnit<Services> for StickerReply {
    fn rules() -> Vec<MatchRule> {
        vec![MatchRule::Unary(UnaryKind::Sticker)]
    }

    fn build(services: &Services) -> Result<Self> {
        Ok(Self {
            bot: services.bot.clone(),
        })
    }
}
