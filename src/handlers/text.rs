use anyhow::Result;
use async_trait::async_trait;
use teloxide::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{reply_chat, send_unless_cancelled, Services};
use crate::platform::Update;
use crate::routing::{Handler, HandlerUnit, MatchRule};

/// Replies to any message containing a greeting
pub struct HelloText {
    bot: Bot,
}

#[async_trait]
impl Handler for HelloText {
    async fn handle(&self, update: &Update, cancel: &CancellationToken) -> Result<()> {
        let chat_id = reply_chat(update)?;
        let first_name = update
            .sender()
            .map(|s| s.first_name.as_str())
            .unwrap_or("there");

        info!("User {:?} sent a greeting", update.sender().map(|s| s.id));

        let reply = self.bot.send_message(
            chat_id,
            format!(
                "Hello, {}! 😊\n\n\
                 I detected that you greeted me. This handler responds to any \
                 message containing 'hello' or 'hi'.",
                first_name
            ),
        );
        send_unless_cancelled(reply, cancel).await?;

        Ok(())
    }
}

impl HandlerUnit<Services> for HelloText {
    fn rules() -> Vec<MatchRule> {
        vec![MatchRule::text("hello"), MatchRule::text("hi")]
    }

    fn build(services: &Services) -> Result<Self> {
        Ok(Self {
            bot: services.bot.clone(),
        })
    }
}
