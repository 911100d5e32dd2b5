//! Outbound calls: `sendMessage` and `setMyCommands`.

use super::types::{TgReplyMarkup, TgResponse, TgSendMessage};
use super::TelegramChannel;
use nudge_core::{error::NudgeError, message::OutgoingMessage};
use tracing::{info, warn};

impl TelegramChannel {
    /// Send a text message, with its reply menu if any.
    pub(crate) async fn send_text(&self, message: &OutgoingMessage) -> Result<(), NudgeError> {
        let url = format!("{}/sendMessage", self.base_url);
        let body = TgSendMessage {
            chat_id: message.chat_id,
            text: &message.text,
            reply_markup: message.keyboard.as_ref().map(TgReplyMarkup::from),
        };

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| NudgeError::Channel(format!("telegram send failed: {e}")))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }

        let error_text = resp.text().await.unwrap_or_default();
        Err(send_error(message.chat_id, status.as_u16(), &error_text))
    }

    /// Register bot commands with Telegram so users see an autocomplete menu.
    /// Best-effort: logs failures but does not propagate errors.
    pub(crate) async fn register_commands(&self) {
        let commands = serde_json::json!({
            "commands": [
                { "command": "start", "description": "Set up or restart your reminders" },
            ]
        });

        let url = format!("{}/setMyCommands", self.base_url);
        match self.client.post(&url).json(&commands).send().await {
            Ok(resp) if resp.status().is_success() => {
                info!("registered Telegram bot commands");
            }
            Ok(resp) => {
                let body = resp.text().await.unwrap_or_default();
                warn!("failed to register Telegram bot commands: {body}");
            }
            Err(e) => {
                warn!("failed to register Telegram bot commands: {e}");
            }
        }
    }
}

/// Map a failed `sendMessage` response to an error.
///
/// 401/403 mean the user blocked the bot (or the bot lost access to the chat).
pub(crate) fn send_error(chat_id: i64, status: u16, body: &str) -> NudgeError {
    let description = serde_json::from_str::<TgResponse<serde_json::Value>>(body)
        .ok()
        .and_then(|r| r.description)
        .unwrap_or_else(|| body.to_string());

    match status {
        401 | 403 => NudgeError::Unreachable(format!("chat {chat_id}: {description}")),
        _ => NudgeError::Channel(format!(
            "telegram send to {chat_id} got {status}: {description}"
        )),
    }
}
