use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::Serialize;

use crate::category::Category;
use crate::guardian::GuardianState;
use crate::schema::DocumentTemplate;

/// Sentinel meaning "the citizen explicitly declared this field not
/// applicable". Counts as filled for progress purposes, but is never treated
/// as a real value for group satisfaction or propagation.
pub const NOT_APPLICABLE: &str = "N/A";

/// Whether a value satisfies its field (and, for grouped fields, the whole
/// group): non-empty and not the `N/A` sentinel.
pub fn is_real_value(value: &str) -> bool {
    !value.is_empty() && value != NOT_APPLICABLE
}

/// Live fill state of one document within a session.
#[derive(Clone, Debug, Serialize)]
pub struct DocumentState {
    /// Field id -> current value; `""` means unset.
    pub fields: IndexMap<String, String>,
    pub descriptions: BTreeMap<String, String>,
    /// Immutable snapshot of the template defaults.
    pub template: IndexMap<String, String>,
    pub filled_count: usize,
    pub total_count: usize,
}

impl DocumentState {
    pub fn from_template(template: &DocumentTemplate) -> Self {
        let fields: IndexMap<String, String> = template
            .fields
            .keys()
            .map(|field| (field.clone(), String::new()))
            .collect();
        let total_count = fields.len();
        Self {
            fields,
            descriptions: template.descriptions.clone(),
            template: template.fields.clone(),
            filled_count: 0,
            total_count,
        }
    }

    /// Description text for a field, falling back to the raw field id.
    pub fn description<'a>(&'a self, field: &'a str) -> &'a str {
        self.descriptions
            .get(field)
            .map(String::as_str)
            .unwrap_or(field)
    }

    /// Writes a value, maintaining the filled-count invariant: the count
    /// equals the number of non-empty fields at all times. Returns false if
    /// the field does not exist on this document.
    pub fn write_value(&mut self, field: &str, value: &str) -> bool {
        let Some(slot) = self.fields.get_mut(field) else {
            return false;
        };
        let was_empty = slot.is_empty();
        *slot = value.to_owned();
        if was_empty && !value.is_empty() {
            self.filled_count += 1;
        } else if !was_empty && value.is_empty() {
            self.filled_count -= 1;
        }
        true
    }

    pub fn value(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }
}

/// Full state of one citizen's in-progress multi-document form completion.
#[derive(Clone, Debug, Serialize)]
pub struct Session {
    pub id: String,
    pub category: Category,
    pub documents: IndexMap<String, DocumentState>,
    pub current_document: Option<String>,
    pub completed: bool,
    pub guardian: GuardianState,
    pub final_confirmation_shown: bool,
    /// Number of fields actually required after equivalence-group
    /// collapsing, computed once at creation and reused for progress.
    pub initial_total_fields: usize,
}

impl Session {
    pub fn new(
        id: impl Into<String>,
        category: Category,
        templates: &IndexMap<String, DocumentTemplate>,
    ) -> Self {
        let documents: IndexMap<String, DocumentState> = templates
            .iter()
            .map(|(name, template)| (name.clone(), DocumentState::from_template(template)))
            .collect();
        let current_document = documents.keys().next().cloned();
        Self {
            id: id.into(),
            category,
            documents,
            current_document,
            completed: false,
            guardian: GuardianState::default(),
            final_confirmation_shown: false,
            initial_total_fields: 0,
        }
    }

    /// Description lookup across all documents; first match wins.
    pub fn describe_field(&self, field: &str) -> Option<&str> {
        self.documents
            .values()
            .find_map(|doc| doc.descriptions.get(field).map(String::as_str))
    }

    /// All (description, value) pairs holding a real value, in stable
    /// document-then-field order. This is the "already collected" manifest
    /// handed to the generation service and the summary builder.
    pub fn filled_manifest(&self) -> Vec<(String, String)> {
        let mut manifest = Vec::new();
        for doc in self.documents.values() {
            for (field, value) in &doc.fields {
                if is_real_value(value) {
                    manifest.push((doc.description(field).to_owned(), value.clone()));
                }
            }
        }
        manifest
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChatTurn {
    pub speaker: Speaker,
    pub text: String,
}

/// Per-session dialogue history, bounded to the most recent turns so the
/// generation service never sees enough context to re-derive stale state.
#[derive(Clone, Debug)]
pub struct ChatHistory {
    turns: Vec<ChatTurn>,
    limit: usize,
}

impl ChatHistory {
    pub const DEFAULT_LIMIT: usize = 6;

    pub fn with_limit(limit: usize) -> Self {
        Self {
            turns: Vec::new(),
            limit: limit.max(2),
        }
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.push(ChatTurn {
            speaker: Speaker::User,
            text: text.into(),
        });
    }

    pub fn push_assistant(&mut self, text: impl Into<String>) {
        self.push(ChatTurn {
            speaker: Speaker::Assistant,
            text: text.into(),
        });
    }

    fn push(&mut self, turn: ChatTurn) {
        self.turns.push(turn);
        if self.turns.len() > self.limit {
            let excess = self.turns.len() - self.limit;
            self.turns.drain(..excess);
        }
    }

    /// The most recent assistant turn, i.e. the question the citizen is
    /// currently answering.
    pub fn last_question(&self) -> Option<&str> {
        self.turns
            .iter()
            .rev()
            .find(|turn| turn.speaker == Speaker::Assistant)
            .map(|turn| turn.text.as_str())
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }
}

impl Default for ChatHistory {
    fn default() -> Self {
        Self::with_limit(Self::DEFAULT_LIMIT)
    }
}
