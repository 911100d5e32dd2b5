use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An incoming text message from a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingMessage {
    /// Channel name (e.g. "telegram").
    pub channel: String,
    /// Conversation the message arrived in; replies and reminders go back here.
    pub chat_id: i64,
    /// Platform-specific user ID of the author.
    pub sender_id: i64,
    /// Message text content.
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// An outgoing message to send through a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub chat_id: i64,
    pub text: String,
    /// Reply menu shown under the message. `None` leaves the client's current menu alone.
    #[serde(default)]
    pub keyboard: Option<Keyboard>,
}

impl OutgoingMessage {
    pub fn new(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            keyboard: None,
        }
    }

    pub fn with_keyboard(mut self, keyboard: Keyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }
}

/// A reply menu of button labels. Pressing a button sends its label as text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Keyboard {
    /// Rows of buttons. `one_time` hides the menu after the first press.
    Buttons { rows: Vec<Vec<String>>, one_time: bool },
    /// Remove whatever menu is currently shown.
    Remove,
}

impl Keyboard {
    /// One button per row, hidden after use.
    pub fn column<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Buttons {
            rows: labels.into_iter().map(|l| vec![l.into()]).collect(),
            one_time: true,
        }
    }

    /// All labels in a single-use grid `width` buttons wide.
    pub fn grid<I, S>(labels: I, width: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        Self::Buttons {
            rows: labels.chunks(width.max(1)).map(<[String]>::to_vec).collect(),
            one_time: true,
        }
    }

    /// A single button that stays visible until replaced.
    pub fn persistent(label: impl Into<String>) -> Self {
        Self::Buttons {
            rows: vec![vec![label.into()]],
            one_time: false,
        }
    }

    /// Flat list of every button label, row by row.
    pub fn labels(&self) -> Vec<&str> {
        match self {
            Self::Buttons { rows, .. } => rows.iter().flatten().map(String::as_str).collect(),
            Self::Remove => Vec::new(),
        }
    }
}
