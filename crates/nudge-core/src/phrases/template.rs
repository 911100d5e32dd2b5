use serde::{Deserialize, Serialize};

/// A reminder phrase and where the task text goes in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "place", rename_all = "lowercase")]
pub enum Template {
    /// Phrase first, task after: `"{text} {task}"`.
    Left { text: String },
    /// Task first, phrase after: `"{task} {text}"`.
    Right { text: String },
    /// Task spliced between two fragments: `"{before} {task} {after}"`.
    Center { before: String, after: String },
}

impl Template {
    /// Render the reminder for `task`.
    pub fn render(&self, task: &str) -> String {
        match self {
            Self::Left { text } => format!("{text} {task}"),
            Self::Right { text } => format!("{task} {text}"),
            Self::Center { before, after } => format!("{before} {task} {after}"),
        }
    }
}
