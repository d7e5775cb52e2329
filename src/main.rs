use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use teloxide::Bot;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use routebot::config::Config;
use routebot::handlers::{self, Services};
use routebot::platform::telegram::{self, PollingOptions};
use routebot::routing::Dispatcher;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Configuration loaded from: {}", config_path.display());
    info!(
        "  Drop pending updates: {}",
        config.telegram.drop_pending_updates
    );

    let bot = Bot::new(&config.telegram.bot_token);
    let services = Services::new(bot.clone());

    let (registry, container) = handlers::discover().context("Failed to register handlers")?;
    let router = Arc::new(Dispatcher::new(registry, container, services));

    let options = PollingOptions {
        drop_pending_updates: config.telegram.drop_pending_updates,
    };

    info!("Bot is starting...");
    telegram::run(bot, router, options, CancellationToken::new()).await?;

    Ok(())
}
