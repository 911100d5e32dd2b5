use serde::{Deserialize, Serialize};

/// Channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChannelConfig {
    pub telegram: Option<TelegramConfig>,
}

/// Telegram bot config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default = "super::defaults::default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub bot_token: String,
    /// Telegram user IDs allowed to talk to the bot. Empty = everyone.
    #[serde(default)]
    pub allowed_users: Vec<i64>,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bot_token: String::new(),
            allowed_users: Vec::new(),
        }
    }
}
