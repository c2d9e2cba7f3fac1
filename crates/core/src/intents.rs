//! Declarative phrase tables for the small amount of utterance
//! classification the engine does itself (everything else goes through the
//! extraction service). Matching is case-insensitive and word-bounded so
//! "no" does not fire inside "know".

/// Phrases meaning "there is no guardian" / "does not apply".
pub const GUARDIAN_NEGATIVE: &[&str] = &[
    "no",
    "none",
    "nope",
    "not applicable",
    "no guardian",
    "don t have",
    "do not have",
    "doesn t apply",
    "does not apply",
    "without",
    "there is no",
];

/// Phrases meaning "yes, a guardian exists".
pub const GUARDIAN_POSITIVE: &[&str] = &[
    "yes",
    "yeah",
    "yep",
    "there is",
    "i have",
    "i do",
    "he is",
    "she is",
    "my",
];

/// Phrases asking to skip the fields currently being asked.
const SKIP_PHRASES: &[&str] = &[
    "skip",
    "pass",
    "not applicable",
    "not needed",
    "no need",
    "don t know",
    "do not know",
    "no idea",
    "doesn t apply",
    "does not apply",
    "none",
    "no",
    "nothing",
];

/// Phrases at the confirmation stage meaning "don't submit yet".
const REVISION_PHRASES: &[&str] = &[
    "no",
    "not yet",
    "wait",
    "wrong",
    "incorrect",
    "mistake",
    "change",
    "modify",
    "edit",
    "fix",
    "redo",
    "again",
    "check",
    "show me",
    "let me see",
    "review",
];

/// Lowercases and maps every non-alphanumeric character to a space, so
/// phrase tables can be written in a single canonical form ("don t have"
/// matches "don't have", "don`t have", ...).
fn normalize(text: &str) -> String {
    let mut normalized = String::with_capacity(text.len() + 2);
    normalized.push(' ');
    for character in text.chars() {
        if character.is_alphanumeric() {
            normalized.extend(character.to_lowercase());
        } else {
            normalized.push(' ');
        }
    }
    normalized.push(' ');
    normalized
}

/// Word-bounded containment of any table phrase in the utterance.
pub fn matches_any(utterance: &str, phrases: &[&str]) -> bool {
    let normalized = normalize(utterance);
    phrases
        .iter()
        .any(|phrase| normalized.contains(&format!(" {phrase} ")))
}

/// Whether the utterance asks to skip the currently pending fields.
pub fn wants_skip(utterance: &str) -> bool {
    matches_any(utterance, SKIP_PHRASES)
}

/// Whether, at the final-confirmation stage, the utterance declines
/// submission and asks to revise instead.
pub fn wants_revision(utterance: &str) -> bool {
    matches_any(utterance, REVISION_PHRASES)
}
