use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::error::StartupError;

/// Environment variable that overrides `telegram.bot_token`
pub const TOKEN_ENV: &str = "TELEGRAM_BOT_TOKEN";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    /// Skip updates that queued up while the bot was offline
    #[serde(default = "default_drop_pending_updates")]
    pub drop_pending_updates: bool,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            drop_pending_updates: default_drop_pending_updates(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    /// `EnvFilter` directives, used when `RUST_LOG` is not set
    #[serde(default)]
    pub filter: Option<String>,
}

fn default_drop_pending_updates() -> bool {
    true
}

pub fn default_log_filter() -> String {
    "info,routebot=debug".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.telegram.bot_token =
            resolve_token(&config.telegram.bot_token, std::env::var(TOKEN_ENV).ok())?;

        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Log filter from `[logging] filter`, or the built-in default
    pub fn log_filter(&self) -> String {
        self.logging.filter.clone().unwrap_or_else(default_log_filter)
    }
}

/// The environment token wins over the file token. Blank tokens count as
/// missing.
fn resolve_token(file_token: &str, env_token: Option<String>) -> Result<String, StartupError> {
    env_token
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .or_else(|| Some(file_token.trim().to_string()).filter(|t| !t.is_empty()))
        .ok_or(StartupError::MissingToken)
}
