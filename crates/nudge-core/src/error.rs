use thiserror::Error;

/// Top-level error type for Nudge.
#[derive(Debug, Error)]
pub enum NudgeError {
    /// Error from a messaging channel.
    #[error("channel error: {0}")]
    Channel(String),

    /// The recipient blocked the bot or revoked its access.
    #[error("recipient unreachable: {0}")]
    Unreachable(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Memory/storage error.
    #[error("memory error: {0}")]
    Memory(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl NudgeError {
    /// Whether this error means the chat can no longer be reached at all.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable(_))
    }
}
