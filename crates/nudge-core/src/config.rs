mod channels;
mod defaults;


pub use channels::*;

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::NudgeError;
use defaults::*;

/// Environment variable consulted when `channel.telegram.bot_token` is empty.
pub const BOT_TOKEN_ENV: &str = "TELEGRAM_BOT_TOKEN";

/// Top-level Nudge configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub channel: ChannelConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// General bot settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Bundled phrasebook to use ("en" or "uk").
    #[serde(default = "default_language")]
    pub language: String,
    /// Custom phrasebook file. Empty = use the bundled one for `language`.
    #[serde(default)]
    pub phrases_path: String,
    /// Also write logs to `{data_dir}/logs/nudge.log`.
    #[serde(default)]
    pub log_file: bool,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            language: default_language(),
            phrases_path: String::new(),
            log_file: false,
        }
    }
}

/// Memory config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

/// Reminder timing. Each delay is drawn uniformly from whole minutes in
/// `min_interval_minutes..=max_interval_minutes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_min_interval")]
    pub min_interval_minutes: u64,
    #[serde(default = "default_max_interval")]
    pub max_interval_minutes: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            min_interval_minutes: default_min_interval(),
            max_interval_minutes: default_max_interval(),
        }
    }
}

impl SchedulerConfig {
    fn validate(&self) -> Result<(), NudgeError> {
        if self.min_interval_minutes == 0 {
            return Err(NudgeError::Config(
                "scheduler.min_interval_minutes must be at least 1".into(),
            ));
        }
        if self.min_interval_minutes > self.max_interval_minutes {
            return Err(NudgeError::Config(format!(
                "scheduler.min_interval_minutes ({}) exceeds max_interval_minutes ({})",
                self.min_interval_minutes, self.max_interval_minutes
            )));
        }
        Ok(())
    }
}

/// Expand `~` to home directory.
pub fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{rest}", home.to_string_lossy());
        }
    }
    path.to_string()
}

/// Load configuration from a TOML file.
///
/// Falls back to defaults if the file does not exist. An empty Telegram
/// token is filled from `TELEGRAM_BOT_TOKEN`.
pub fn load(path: &str) -> Result<Config, NudgeError> {
    let path = Path::new(path);
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path).map_err(|e| {
            NudgeError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        parse(&content)?
    } else {
        tracing::info!(
            "Config file not found at {}, using defaults",
            path.display()
        );
        Config::default()
    };

    apply_env_token(&mut config, std::env::var(BOT_TOKEN_ENV).ok());
    Ok(config)
}

/// Parse and validate configuration from TOML text.
pub fn parse(content: &str) -> Result<Config, NudgeError> {
    let config: Config = toml::from_str(content)
        .map_err(|e| NudgeError::Config(format!("failed to parse config: {}", e)))?;
    config.scheduler.validate()?;
    Ok(config)
}

fn apply_env_token(config: &mut Config, token: Option<String>) {
    let Some(token) = token.filter(|t| !t.is_empty()) else {
        return;
    };
    let tg = config.channel.telegram.get_or_insert_with(TelegramConfig::default);
    if tg.bot_token.is_empty() {
        tg.bot_token = token;
    }
}
