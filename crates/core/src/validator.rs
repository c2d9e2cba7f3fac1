//! Protocol validation of generated dialogue turns. The generation service
//! gives no compliance guarantee, so every candidate turn is checked here
//! and replaced by a deterministic fallback when it breaks the rules: the
//! engine, not the generator, owns the completion decision.

use thiserror::Error;
use tracing::warn;

use crate::fields::resolve::UnfilledField;

/// Closing/completion vocabulary the generator must never use while fields
/// remain unfilled.
const COMPLETION_PHRASES: &[&str] = &[
    "all done",
    "we are done",
    "we're done",
    "all set",
    "completed",
    "complete!",
    "is complete",
    "been filled in",
    "everything has been filled",
    "finished",
    "thank you for your time",
    "thanks for your time",
    "have a great day",
    "good luck with your application",
    "ready to submit",
    "shall i submit",
    "would you like to submit",
    "do you want to submit",
    "please confirm your submission",
    "is there anything else",
    "anything else you need",
    "anything else i can help",
    "what else do you need",
];

/// Question patterns that, combined with a filled field's keywords, signal
/// the generator re-asking something already collected.
const ASK_PREFIXES: &[&str] = &[
    "what is your ",
    "what is the ",
    "what's your ",
    "may i have your ",
    "may i ask your ",
    "could you tell me your ",
    "could you provide your ",
    "please tell me your ",
    "please provide your ",
    "can you give me your ",
];

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationViolation {
    #[error("turn declares completion while {unfilled_remaining} fields remain")]
    PrematureCompletion { unfilled_remaining: usize },
    #[error("turn does not end with a question")]
    NotAQuestion,
    #[error("turn re-asks an already filled field (matched `{pattern}`)")]
    ReasksFilledField { pattern: String },
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TurnValidator;

impl TurnValidator {
    /// Checks a candidate turn against the dialogue protocol. Checks run
    /// in order; the first violation wins.
    pub fn evaluate(
        &self,
        reply: &str,
        unfilled: &[UnfilledField],
        filled_descriptions: &[String],
    ) -> Result<(), ValidationViolation> {
        let lowered = reply.to_lowercase();

        if !unfilled.is_empty() {
            if let Some(phrase) = COMPLETION_PHRASES
                .iter()
                .find(|phrase| lowered.contains(**phrase))
            {
                warn!(
                    event_name = "validator.premature_completion",
                    phrase, "generated turn used closing language too early"
                );
                return Err(ValidationViolation::PrematureCompletion {
                    unfilled_remaining: unfilled.len(),
                });
            }
        }

        if !last_line_is_question(reply) {
            warn!(
                event_name = "validator.not_a_question",
                "generated turn does not end with a question"
            );
            return Err(ValidationViolation::NotAQuestion);
        }

        for keyword in filled_keywords(filled_descriptions) {
            if keyword.len() < 3 {
                continue;
            }
            for prefix in ASK_PREFIXES {
                let pattern = format!("{prefix}{keyword}");
                if lowered.contains(&pattern) {
                    warn!(
                        event_name = "validator.reasked_filled_field",
                        pattern = %pattern,
                        "generated turn re-asked an already collected field"
                    );
                    return Err(ValidationViolation::ReasksFilledField { pattern });
                }
            }
        }

        Ok(())
    }

    /// Deterministic substitute used whenever the generated turn is
    /// invalid or the generation service failed outright.
    pub fn fallback_question(&self, unfilled: &[UnfilledField]) -> String {
        match unfilled.first() {
            Some(next) => format!("Understood. What is {}?", article_free(&next.description)),
            None => "Could you tell me the next piece of information?".to_owned(),
        }
    }
}

/// The last non-empty line, with emphasis markup stripped, must end in a
/// question mark.
fn last_line_is_question(reply: &str) -> bool {
    let Some(last_line) = reply.lines().rev().find(|line| !line.trim().is_empty()) else {
        return false;
    };
    let stripped = last_line.replace("**", "");
    stripped.trim_end().ends_with('?')
}

/// Expands each filled description into the keyword set used for re-ask
/// detection. Descriptions arrive in free text, so a few common synonyms
/// are added per datum kind.
fn filled_keywords(descriptions: &[String]) -> Vec<String> {
    let mut keywords = Vec::new();
    for description in descriptions {
        let lowered = description.to_lowercase();
        keywords.push(lowered.clone());
        if lowered.contains("name") {
            keywords.push("name".to_owned());
            keywords.push("full name".to_owned());
        }
        if lowered.contains("birth") {
            keywords.push("birth date".to_owned());
            keywords.push("date of birth".to_owned());
            keywords.push("birthday".to_owned());
        }
        if lowered.contains("address") {
            keywords.push("address".to_owned());
            keywords.push("residence".to_owned());
        }
        if lowered.contains("phone") || lowered.contains("number") {
            keywords.push("phone number".to_owned());
            keywords.push("contact number".to_owned());
            keywords.push("telephone".to_owned());
        }
        if lowered.contains("relationship") {
            keywords.push("relationship".to_owned());
        }
    }
    keywords.sort();
    keywords.dedup();
    keywords
}

fn article_free(description: &str) -> String {
    let trimmed = description.trim();
    let lowered = trimmed.to_lowercase();
    for article in ["the ", "a ", "an ", "your "] {
        if let Some(rest) = lowered.strip_prefix(article) {
            return format!("your {rest}");
        }
    }
    format!("your {lowered}")
}
