//! Rendering transcript entries into prompt lines.

use crate::transcript::{EmitterRole, Message};

const NARRATOR_LABEL: &str = "Narrator";
const PARENS: [char; 4] = ['(', ')', '（', '）'];

/// Line used in the speaker selection context.
pub fn selection_line(message: &Message) -> String {
    match message.role {
        EmitterRole::User => format!("User: {}", message.content),
        EmitterRole::Narrator => format!("{}: ({})", NARRATOR_LABEL, message.content),
        EmitterRole::Character => format!("{}: {}", message.speaker_label(), message.content),
    }
}

/// Line used in the generation prompt. Narrator text is re-wrapped in a
/// single pair of parentheses.
pub fn generation_line(message: &Message) -> String {
    match message.role {
        EmitterRole::Narrator => format!(
            "{}: ({})",
            NARRATOR_LABEL,
            strip_parens(&message.content)
        ),
        _ => selection_line(message),
    }
}

/// Drop ASCII and full-width parentheses from both ends.
pub fn strip_parens(text: &str) -> &str {
    text.trim_matches(&PARENS[..])
}
