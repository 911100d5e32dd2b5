//! Telegram Bot API (de)serialization types.

use nudge_core::message::Keyboard;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
pub(crate) struct TgResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
    pub error_code: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TgUpdate {
    pub update_id: i64,
    pub message: Option<TgMessage>,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
pub(crate) struct TgMessage {
    pub message_id: i64,
    pub from: Option<TgUser>,
    pub chat: TgChat,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
pub(crate) struct TgUser {
    pub id: i64,
    pub first_name: String,
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TgChat {
    pub id: i64,
}

/// Body of a `sendMessage` call.
#[derive(Debug, Serialize)]
pub(crate) struct TgSendMessage<'a> {
    pub chat_id: i64,
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<TgReplyMarkup>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub(crate) enum TgReplyMarkup {
    Keyboard {
        keyboard: Vec<Vec<TgKeyboardButton>>,
        one_time_keyboard: bool,
        resize_keyboard: bool,
    },
    Remove {
        remove_keyboard: bool,
    },
}

#[derive(Debug, Serialize)]
pub(crate) struct TgKeyboardButton {
    pub text: String,
}

impl From<&Keyboard> for TgReplyMarkup {
    fn from(kb: &Keyboard) -> Self {
        match kb {
            Keyboard::Buttons { rows, one_time } => Self::Keyboard {
                keyboard: rows
                    .iter()
                    .map(|row| {
                        row.iter()
                            .map(|label| TgKeyboardButton {
                                text: label.clone(),
                            })
                            .collect()
                    })
                    .collect(),
                one_time_keyboard: *one_time,
                resize_keyboard: true,
            },
            Keyboard::Remove => Self::Remove {
                remove_keyboard: true,
            },
        }
    }
}
