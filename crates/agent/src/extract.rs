//! Slot extraction: one LLM call turning a citizen utterance into
//! `field -> value` updates for a small set of target fields. The reply is
//! treated as untrusted; anything that does not parse, or names a field
//! outside the target set, is dropped.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use civiform_core::errors::EngineError;
use civiform_core::UnfilledField;

use crate::llm::LlmClient;

/// Upper bound on fields the orchestrator offers per turn on the normal
/// path. A short target list keeps the model focused on the question just
/// asked; the edit path after a revision request passes every field.
pub const MAX_TARGET_FIELDS: usize = 5;

pub struct SlotExtractor {
    llm: Arc<dyn LlmClient>,
}

impl SlotExtractor {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Extracts values for the given candidate fields from the utterance.
    /// Returns an empty map on any LLM or parse failure; the turn then
    /// proceeds without updates.
    pub async fn extract(
        &self,
        utterance: &str,
        candidates: &[UnfilledField],
        last_question: Option<&str>,
    ) -> BTreeMap<String, String> {
        let targets: Vec<&UnfilledField> = candidates.iter().collect();
        if targets.is_empty() {
            return BTreeMap::new();
        }

        let prompt = build_prompt(utterance, &targets, last_question);
        let reply = match self.llm.complete(&prompt).await {
            Ok(reply) => reply,
            Err(error) => {
                warn!(
                    event_name = "extract.llm_failed",
                    error = %error,
                    "extraction call failed; continuing without updates"
                );
                return BTreeMap::new();
            }
        };

        let extracted = parse_extraction(&reply, &targets);
        debug!(
            event_name = "extract.completed",
            target_count = targets.len(),
            extracted_count = extracted.len(),
            "slot extraction finished"
        );
        extracted
    }
}

fn build_prompt(
    utterance: &str,
    targets: &[&UnfilledField],
    last_question: Option<&str>,
) -> String {
    let mut prompt = String::from(
        "You extract form field values from a citizen's message.\n\
         Return ONLY a JSON object mapping field ids to string values.\n\
         Include a field only when the message clearly provides its value.\n\
         Do not guess, do not invent values, do not add extra keys.\n\
         Normalize dates to YYYY-MM-DD, phone numbers to digits with \
         dashes, checkbox answers to \"O\" for yes and \"N/A\" for no.\n\n\
         Fields that may be filled:\n",
    );
    for target in targets {
        let _ = writeln!(prompt, "- {}: {}", target.field, target.description);
    }
    if let Some(question) = last_question {
        let _ = writeln!(prompt, "\nThe question the citizen is answering:\n{question}");
    }
    let _ = writeln!(prompt, "\nCitizen message:\n{utterance}");
    prompt.push_str("\nJSON object:");
    prompt
}

/// Pulls the first `{...}` object out of the reply (models often wrap JSON
/// in prose or code fences), parses it, coerces values to strings, and
/// keeps only keys from the target list.
fn parse_extraction(reply: &str, targets: &[&UnfilledField]) -> BTreeMap<String, String> {
    let Some(raw) = first_json_object(reply) else {
        let failure = EngineError::ExtractionParseFailure {
            detail: "reply contained no JSON object".to_owned(),
        };
        warn!(
            event_name = "extract.no_json",
            error = %failure,
            "extraction reply rejected"
        );
        return BTreeMap::new();
    };
    let parsed: Value = match serde_json::from_str(raw) {
        Ok(parsed) => parsed,
        Err(error) => {
            let failure = EngineError::ExtractionParseFailure {
                detail: error.to_string(),
            };
            warn!(
                event_name = "extract.bad_json",
                error = %failure,
                "extraction reply rejected"
            );
            return BTreeMap::new();
        }
    };
    let Value::Object(map) = parsed else {
        return BTreeMap::new();
    };

    let mut extracted = BTreeMap::new();
    for (key, value) in map {
        if !targets.iter().any(|target| target.field == key) {
            warn!(
                event_name = "extract.unexpected_field",
                field = %key,
                "extractor returned a field outside the target set"
            );
            continue;
        }
        let coerced = match value {
            Value::String(text) => text,
            Value::Number(number) => number.to_string(),
            Value::Bool(flag) => flag.to_string(),
            Value::Null | Value::Array(_) | Value::Object(_) => continue,
        };
        let trimmed = coerced.trim();
        if trimmed.is_empty() {
            continue;
        }
        extracted.insert(key, trimmed.to_owned());
    }
    extracted
}

/// First balanced `{...}` span in the text, tracking string literals so
/// braces inside values do not end the object early.
fn first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, character) in text[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match character {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}
