//! Phrasebook: every user-facing string the bot knows.
//!
//! Species labels and keywords double as the router's vocabulary, so they
//! are validated to be pairwise distinct at load time. Reminder pools are
//! species-specific templates plus a generic fallback pool.

mod template;


pub use template::Template;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};

use crate::config::{shellexpand, BotConfig};
use crate::error::NudgeError;

/// Species stored for a chat that has not picked one yet.
pub const DEFAULT_SPECIES: &str = "none";

/// Bundled phrasebooks, embedded at compile time.
const BUNDLED: &[(&str, &str)] = &[
    ("en", include_str!("../../../phrases/en.toml")),
    ("uk", include_str!("../../../phrases/uk.toml")),
];

/// All user-facing text for one language.
#[derive(Debug, Clone, Deserialize)]
pub struct Phrasebook {
    /// Species labels, in menu order.
    pub species: Vec<String>,
    pub keywords: Keywords,
    pub prompts: PromptTexts,
    pub reminders: Reminders,
}

/// Button labels that trigger a specific action when sent back as text.
#[derive(Debug, Clone, Deserialize)]
pub struct Keywords {
    pub stop: String,
    pub restart: String,
    pub change_species: String,
    pub change_task: String,
    pub change_all: String,
    pub keep_current: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PromptTexts {
    pub ask_species: String,
    pub ask_task: String,
    pub armed: String,
    pub stopped: String,
    /// Shown to returning users. Supports `{species}` and `{task}`.
    pub current_settings: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Reminders {
    pub generic: Vec<Template>,
    #[serde(default)]
    pub species: HashMap<String, Vec<Template>>,
}

impl Phrasebook {
    /// Languages with a bundled phrasebook.
    pub fn bundled_languages() -> impl Iterator<Item = &'static str> {
        BUNDLED.iter().map(|(lang, _)| *lang)
    }

    /// Load a bundled phrasebook by language code.
    pub fn bundled(language: &str) -> Result<Self, NudgeError> {
        let (_, raw) = BUNDLED
            .iter()
            .find(|(lang, _)| *lang == language)
            .ok_or_else(|| {
                NudgeError::Config(format!(
                    "no bundled phrasebook for language '{language}' (available: {})",
                    Self::bundled_languages().collect::<Vec<_>>().join(", ")
                ))
            })?;
        Self::from_toml(raw)
    }

    /// Load the phrasebook selected by config: `phrases_path` if set, else the bundled one.
    pub fn load(config: &BotConfig) -> Result<Self, NudgeError> {
        if config.phrases_path.is_empty() {
            return Self::bundled(&config.language);
        }
        let path = shellexpand(&config.phrases_path);
        let raw = std::fs::read_to_string(&path)?;
        let book = Self::from_toml(&raw)?;
        tracing::info!("Loaded phrasebook from {path}");
        Ok(book)
    }

    /// Parse and validate a phrasebook.
    pub fn from_toml(raw: &str) -> Result<Self, NudgeError> {
        let book: Self = toml::from_str(raw)
            .map_err(|e| NudgeError::Config(format!("failed to parse phrasebook: {e}")))?;
        book.validate()?;
        Ok(book)
    }

    fn validate(&self) -> Result<(), NudgeError> {
        if self.species.is_empty() {
            return Err(NudgeError::Config("phrasebook lists no species".into()));
        }
        if self.reminders.generic.is_empty() {
            return Err(NudgeError::Config(
                "phrasebook has an empty generic reminder pool".into(),
            ));
        }

        let mut seen = HashSet::new();
        for word in self.species.iter().chain(self.keyword_list()) {
            let word = word.trim();
            if word.is_empty() {
                return Err(NudgeError::Config("phrasebook has an empty label".into()));
            }
            if word.starts_with('/') {
                return Err(NudgeError::Config(format!(
                    "phrasebook label '{word}' collides with bot commands"
                )));
            }
            if !seen.insert(word) {
                return Err(NudgeError::Config(format!(
                    "phrasebook label '{word}' is used more than once"
                )));
            }
        }

        if let Some(unknown) = self
            .reminders
            .species
            .keys()
            .find(|k| !self.species.contains(*k))
        {
            return Err(NudgeError::Config(format!(
                "reminder pool for unknown species '{unknown}'"
            )));
        }
        Ok(())
    }

    fn keyword_list(&self) -> [&String; 6] {
        let k = &self.keywords;
        [
            &k.stop,
            &k.restart,
            &k.change_species,
            &k.change_task,
            &k.change_all,
            &k.keep_current,
        ]
    }

    pub fn is_species(&self, text: &str) -> bool {
        self.species.iter().any(|s| s == text)
    }

    /// Labels of the returning-user menu, in display order.
    pub fn change_options(&self) -> [&str; 4] {
        let k = &self.keywords;
        [
            k.change_species.as_str(),
            k.change_task.as_str(),
            k.change_all.as_str(),
            k.keep_current.as_str(),
        ]
    }

    /// Species-specific templates followed by the generic pool.
    /// Never empty.
    pub fn reminder_pool(&self, species: &str) -> Vec<&Template> {
        self.reminders
            .species
            .get(species)
            .into_iter()
            .flatten()
            .chain(&self.reminders.generic)
            .collect()
    }

    /// Pick a template uniformly from the pool for `species` and render it for `task`.
    pub fn compose_reminder<R: Rng + ?Sized>(&self, species: &str, task: &str, rng: &mut R) -> String {
        let pool = self.reminder_pool(species);
        match pool.choose(rng) {
            Some(template) => template.render(task),
            None => task.to_string(),
        }
    }

    pub fn current_settings(&self, species: &str, task: &str) -> String {
        self.prompts
            .current_settings
            .replace("{species}", species)
            .replace("{task}", task)
    }
}
