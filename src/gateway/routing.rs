//! Intent classification for inbound text.
//!
//! Rules are checked in order and the first match wins. Species labels and
//! keywords are disjoint (the phrasebook refuses to load otherwise), so the
//! order only matters for the final rule: any text that is not a known
//! label becomes the user's new task.

use nudge_core::phrases::Phrasebook;

/// What an inbound message asks the bot to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    SetSpecies(String),
    Stop,
    Restart,
    ChangeSpeciesOnly,
    ChangeTaskOnly,
    ChangeAll,
    KeepCurrent,
    SetTask(String),
}

/// Classify a message. Pure; never fails.
pub fn classify(phrases: &Phrasebook, text: &str) -> Intent {
    let text = text.trim();

    if is_start_command(text) {
        return Intent::Restart;
    }
    if phrases.is_species(text) {
        return Intent::SetSpecies(text.to_string());
    }
    let k = &phrases.keywords;
    let keyword_rules = [
        (&k.stop, Intent::Stop),
        (&k.restart, Intent::Restart),
        (&k.change_species, Intent::ChangeSpeciesOnly),
        (&k.change_task, Intent::ChangeTaskOnly),
        (&k.change_all, Intent::ChangeAll),
        (&k.keep_current, Intent::KeepCurrent),
    ];
    for (keyword, intent) in keyword_rules {
        if keyword == text {
            return intent;
        }
    }
    // Catch-all: anything unrecognized is a task description.
    Intent::SetTask(text.to_string())
}

/// `/start`, optionally addressed as `/start@botname` or followed by a payload.
fn is_start_command(text: &str) -> bool {
    let Some(first) = text.split_whitespace().next() else {
        return false;
    };
    first.split('@').next() == Some("/start")
}
