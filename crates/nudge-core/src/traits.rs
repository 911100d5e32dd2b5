use crate::{
    error::NudgeError,
    message::{IncomingMessage, OutgoingMessage},
};
use async_trait::async_trait;

/// Messaging Channel trait.
///
/// Every messaging platform implements this trait to receive and send messages.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Human-readable channel name.
    fn name(&self) -> &str;

    /// Start listening for incoming messages.
    /// Returns a receiver that yields incoming messages.
    async fn start(&self) -> Result<tokio::sync::mpsc::Receiver<IncomingMessage>, NudgeError>;

    /// Send a message through this channel.
    ///
    /// Returns [`NudgeError::Unreachable`] when the recipient has blocked the bot.
    async fn send(&self, message: OutgoingMessage) -> Result<(), NudgeError>;

    /// Graceful shutdown.
    async fn stop(&self) -> Result<(), NudgeError>;
}
