//! Gateway: the main event loop between the channel and the reminder scheduler.
//!
//! Messages from one chat are handled one at a time. On shutdown the live
//! timers are checkpointed before anything is stopped.

mod conversation;
mod keyboards;
mod recovery;
mod routing;
mod scheduler;

#[cfg(test)]
mod tests;

pub use scheduler::DelayRange;

use scheduler::ReminderScheduler;

use nudge_core::{message::IncomingMessage, phrases::Phrasebook, traits::Channel};
use nudge_memory::Store;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// The central gateway that routes inbound messages and owns the reminder timers.
pub struct Gateway {
    pub(super) channel: Arc<dyn Channel>,
    pub(super) store: Store,
    pub(super) phrases: Arc<Phrasebook>,
    pub(super) scheduler: ReminderScheduler,
    /// Chats with a message in flight. Later messages from the same chat are buffered here.
    pub(super) active_chats: Mutex<HashMap<i64, Vec<IncomingMessage>>>,
}

impl Gateway {
    /// Create a new gateway.
    pub fn new(
        channel: Arc<dyn Channel>,
        store: Store,
        phrases: Arc<Phrasebook>,
        delays: DelayRange,
    ) -> Self {
        let scheduler =
            ReminderScheduler::new(store.clone(), channel.clone(), phrases.clone(), delays);
        Self {
            channel,
            store,
            phrases,
            scheduler,
            active_chats: Mutex::new(HashMap::new()),
        }
    }

    /// Run the main event loop until a shutdown signal arrives.
    pub async fn run(self: Arc<Self>) -> anyhow::Result<()> {
        let restored = self.restore_ongoing().await;
        info!(
            "Nudge gateway running | channel: {} | restored jobs: {restored}",
            self.channel.name()
        );

        let mut rx = self
            .channel
            .start()
            .await
            .map_err(|e| anyhow::anyhow!("failed to start channel {}: {e}", self.channel.name()))?;

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                maybe = rx.recv() => match maybe {
                    Some(incoming) => self.dispatch_message(incoming).await,
                    None => {
                        warn!("channel closed its message stream");
                        break;
                    }
                },
                _ = &mut shutdown => {
                    info!("Received shutdown signal");
                    break;
                }
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// Dispatch a message: buffer if the chat is busy, otherwise spawn a worker for it.
    ///
    /// Runs on the receive loop, so a chat's messages enter its buffer in arrival order.
    async fn dispatch_message(self: &Arc<Self>, incoming: IncomingMessage) {
        let chat_id = incoming.chat_id;

        {
            let mut active = self.active_chats.lock().await;
            if let Some(buffer) = active.get_mut(&chat_id) {
                buffer.push(incoming);
                info!("buffered message from {chat_id} (previous one still in progress)");
                return;
            }
            active.insert(chat_id, Vec::new());
        }

        let gw = self.clone();
        tokio::spawn(async move {
            gw.process_chat(incoming).await;
        });
    }

    /// Handle one message, then everything buffered for the same chat behind it.
    async fn process_chat(&self, incoming: IncomingMessage) {
        let chat_id = incoming.chat_id;
        self.handle_message(incoming).await;

        // Drain any buffered messages for this chat.
        loop {
            let next = {
                let mut active = self.active_chats.lock().await;
                match active.get_mut(&chat_id) {
                    Some(buf) if !buf.is_empty() => Some(buf.remove(0)),
                    _ => {
                        active.remove(&chat_id);
                        None
                    }
                }
            };

            match next {
                Some(buffered) => self.handle_message(buffered).await,
                None => break,
            }
        }
    }

    /// Graceful shutdown: checkpoint live timers first, then stop them and the channel.
    async fn shutdown(&self) {
        info!("Shutting down...");

        self.checkpoint_timers().await;
        let stopped = self.scheduler.drain();
        info!("stopped {stopped} reminder jobs");

        if let Err(e) = self.channel.stop().await {
            warn!("failed to stop channel {}: {e}", self.channel.name());
        }

        info!("Shutdown complete.");
    }
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
