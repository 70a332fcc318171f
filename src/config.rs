use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Central configuration loaded from environment variables.
///
/// The .env file is loaded automatically at startup via dotenvy. Only the
/// paths have defaults; chat IDs are required by the commands that need them.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: String,
    /// Where the classifier model blob lives
    pub model_path: PathBuf,
    /// Monitored channel (ban and delete target)
    pub channel_id: Option<i64>,
    /// Chat that receives moderation prompts
    pub moderation_chat_id: Option<i64>,
    /// Handle of the monitored channel; links to it are not "external"
    pub home_channel: Option<String>,
    /// How many messages `screen` checks in parallel
    pub concurrency: usize,
}

/// Platform data directory for the model: ~/.local/share/warden/ on Linux.
pub fn default_model_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("warden")
        .join("classifier.json")
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_chat_id(name: &str) -> Result<Option<i64>> {
    optional_var(name)
        .map(|v| {
            v.trim()
                .parse::<i64>()
                .with_context(|| format!("{name} must be a numeric chat id, got '{v}'"))
        })
        .transpose()
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self> {
        let concurrency = match optional_var("WARDEN_CONCURRENCY") {
            Some(v) => v
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .with_context(|| format!("WARDEN_CONCURRENCY must be a positive integer, got '{v}'"))?,
            None => 8,
        };

        Ok(Self {
            db_path: optional_var("WARDEN_DB_PATH").unwrap_or_else(|| "./warden.db".to_string()),
            model_path: optional_var("WARDEN_MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(default_model_path),
            channel_id: parse_chat_id("WARDEN_CHANNEL_ID")?,
            moderation_chat_id: parse_chat_id("WARDEN_MODERATION_CHAT_ID")?,
            home_channel: optional_var("WARDEN_HOME_CHANNEL"),
            concurrency,
        })
    }

    /// Check that the monitored channel is configured.
    /// Call this before any operation that bans or deletes.
    pub fn require_channel(&self) -> Result<i64> {
        self.channel_id.with_context(|| {
            "WARDEN_CHANNEL_ID not set. Add it to your .env file.\n\
             See .env.example for the required variables."
        })
    }

    /// Check that the moderation chat is configured.
    /// Call this before any operation that sends moderation prompts.
    pub fn require_moderation_chat(&self) -> Result<i64> {
        self.moderation_chat_id.with_context(|| {
            "WARDEN_MODERATION_CHAT_ID not set. Add it to your .env file.\n\
             See .env.example for the required variables."
        })
    }
}
