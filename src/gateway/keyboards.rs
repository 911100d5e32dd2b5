//! Reply menus attached to outbound messages.

use nudge_core::{message::Keyboard, phrases::Phrasebook};

/// One button per species.
pub(super) fn species(phrases: &Phrasebook) -> Keyboard {
    Keyboard::column(phrases.species.iter().cloned())
}

/// The four returning-user options, two per row.
pub(super) fn change_options(phrases: &Phrasebook) -> Keyboard {
    Keyboard::grid(phrases.change_options(), 2)
}

/// Attached to every reminder.
pub(super) fn stop(phrases: &Phrasebook) -> Keyboard {
    Keyboard::column([phrases.keywords.stop.clone()])
}

/// Shown after stopping; stays until the user comes back.
pub(super) fn restart(phrases: &Phrasebook) -> Keyboard {
    Keyboard::persistent(phrases.keywords.restart.clone())
}
