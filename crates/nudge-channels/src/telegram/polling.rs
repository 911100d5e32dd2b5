//! Long-polling update loop and Channel trait implementation.

use super::types::{TgResponse, TgUpdate};
use super::TelegramChannel;
use async_trait::async_trait;
use nudge_core::{
    error::NudgeError,
    message::{IncomingMessage, OutgoingMessage},
    traits::Channel,
};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn start(&self) -> Result<mpsc::Receiver<IncomingMessage>, NudgeError> {
        self.register_commands().await;

        let (tx, rx) = mpsc::channel(64);
        let client = self.client.clone();
        let base_url = self.base_url.clone();
        let allowed_users = self.config.allowed_users.clone();
        let last_update_id = self.last_update_id.clone();

        info!("Telegram channel starting long polling...");

        let handle = tokio::spawn(async move {
            let mut backoff_secs: u64 = 1;

            loop {
                let last = last_update_id.lock().await;
                let offset = last.map(|id| id + 1);
                drop(last);

                let mut url = format!("{base_url}/getUpdates?timeout=30");
                if let Some(off) = offset {
                    url.push_str(&format!("&offset={off}"));
                }

                let resp = match client
                    .get(&url)
                    .timeout(Duration::from_secs(35))
                    .send()
                    .await
                {
                    Ok(r) => r,
                    Err(e) => {
                        error!("telegram poll error (retry in {backoff_secs}s): {e}");
                        tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
                        backoff_secs = next_backoff(backoff_secs);
                        continue;
                    }
                };

                let body: TgResponse<Vec<TgUpdate>> = match resp.json().await {
                    Ok(b) => b,
                    Err(e) => {
                        error!("telegram parse error (retry in {backoff_secs}s): {e}");
                        tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
                        backoff_secs = next_backoff(backoff_secs);
                        continue;
                    }
                };

                if !body.ok {
                    error!(
                        "telegram API error (retry in {backoff_secs}s): {}",
                        body.description.unwrap_or_default()
                    );
                    tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
                    backoff_secs = next_backoff(backoff_secs);
                    continue;
                }

                // Successful poll -- reset backoff.
                backoff_secs = 1;

                let updates = body.result.unwrap_or_default();

                if let Some(last_update) = updates.last() {
                    *last_update_id.lock().await = Some(last_update.update_id);
                }

                for update in updates {
                    let Some(incoming) = to_incoming(update, &allowed_users) else {
                        continue;
                    };
                    if tx.send(incoming).await.is_err() {
                        info!("telegram channel receiver dropped, stopping poll");
                        return;
                    }
                }
            }
        });

        *self.poller.lock().await = Some(handle);
        Ok(rx)
    }

    async fn send(&self, message: OutgoingMessage) -> Result<(), NudgeError> {
        self.send_text(&message).await
    }

    async fn stop(&self) -> Result<(), NudgeError> {
        if let Some(handle) = self.poller.lock().await.take() {
            handle.abort();
        }
        info!("Telegram channel stopped");
        Ok(())
    }
}

/// Convert an update into an incoming message.
///
/// Returns `None` for non-text updates and for senders outside `allowed_users`.
pub(super) fn to_incoming(update: TgUpdate, allowed_users: &[i64]) -> Option<IncomingMessage> {
    let msg = update.message?;
    let Some(text) = msg.text else {
        debug!("telegram: skipping non-text message in chat {}", msg.chat.id);
        return None;
    };
    let user = msg.from?;

    if !allowed_users.is_empty() && !allowed_users.contains(&user.id) {
        warn!("ignoring message from unauthorized user {}", user.id);
        return None;
    }

    Some(IncomingMessage {
        channel: "telegram".to_string(),
        chat_id: msg.chat.id,
        sender_id: user.id,
        text,
        timestamp: chrono::Utc::now(),
    })
}

pub(super) fn next_backoff(current: u64) -> u64 {
    (current * 2).min(60)
}
