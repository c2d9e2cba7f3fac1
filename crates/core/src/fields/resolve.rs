//! Unfilled-field resolution: the ordered list of "next question"
//! candidates for a session. Pure over the session state and recomputed on
//! every turn, because any update can change group satisfaction.

use std::collections::HashSet;

use serde::Serialize;

use crate::category::common_field_groups;
use crate::guardian::GuardianState;
use crate::session::{is_real_value, Session};

/// Fields under this prefix form the guardian cluster gated by the
/// existence question.
pub const GUARDIAN_PREFIX: &str = "guardian.";

/// Synthetic field name for the existence question. Never exists on any
/// document; the orchestrator intercepts it before extraction.
pub const GUARDIAN_PSEUDO_FIELD: &str = "__guardian_exists__";

pub const GUARDIAN_EXISTS_QUESTION: &str =
    "Is there a legal guardian involved in this application?";

/// Fields matching these patterns are computed, never asked.
const DERIVED_FIELD_PATTERNS: &[&str] = &["total_months", "duration", "total_days"];

pub fn is_derived_field(field: &str) -> bool {
    DERIVED_FIELD_PATTERNS
        .iter()
        .any(|pattern| field.contains(pattern))
}

/// One candidate question: a document, a field, and its description.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UnfilledField {
    pub document: String,
    pub field: String,
    pub description: String,
}

/// Computes the deduplicated, stably-ordered list of fields still to ask.
///
/// Order of precedence:
/// 1. While guardian fields exist anywhere, remain unanswered, and the
///    branch is `Unchecked`, a single synthetic candidate for the
///    existence question is returned and nothing else.
/// 2. Derived fields are excluded; guardian fields are excluded entirely
///    once the guardian is confirmed absent.
/// 3. A common-field group with any real value anywhere is satisfied and
///    excluded wholesale; an unsatisfied group contributes only its first
///    unfilled member in document-then-field order.
pub fn unfilled_fields(session: &Session) -> Vec<UnfilledField> {
    if session.guardian == GuardianState::Unchecked {
        if let Some(candidate) = guardian_pseudo_candidate(session) {
            return vec![candidate];
        }
    }
    collapsed_unfilled(session)
}

/// Number of questions still to answer, ignoring the guardian existence
/// gate. Pairs with `Session::initial_total_fields` for progress figures:
/// at creation the two are equal, and answered questions (including a
/// guardian branch resolved either way) shrink this count.
pub fn remaining_field_count(session: &Session) -> usize {
    collapsed_unfilled(session).len()
}

fn collapsed_unfilled(session: &Session) -> Vec<UnfilledField> {
    let groups = common_field_groups(session.category);
    let skip_guardian = session.guardian == GuardianState::ConfirmedAbsent;

    // A group is satisfied once any member anywhere holds a real value.
    let mut satisfied: Vec<bool> = vec![false; groups.len()];
    for (group_idx, group) in groups.iter().enumerate() {
        'members: for member in *group {
            for doc in session.documents.values() {
                if doc.value(member).is_some_and(is_real_value) {
                    satisfied[group_idx] = true;
                    break 'members;
                }
            }
        }
    }

    let mut unfilled = Vec::new();
    let mut represented_groups: HashSet<usize> = HashSet::new();

    for (doc_name, doc) in &session.documents {
        for (field, value) in &doc.fields {
            if is_derived_field(field) {
                continue;
            }
            if skip_guardian && field.contains(GUARDIAN_PREFIX) {
                continue;
            }
            if !value.is_empty() {
                continue;
            }

            let group_idx = groups
                .iter()
                .position(|group| group.contains(&field.as_str()));
            if let Some(group_idx) = group_idx {
                if satisfied[group_idx] || !represented_groups.insert(group_idx) {
                    continue;
                }
            }

            unfilled.push(UnfilledField {
                document: doc_name.clone(),
                field: field.clone(),
                description: doc.description(field).to_owned(),
            });
        }
    }
    unfilled
}

/// The synthetic existence-question candidate, anchored to the first
/// document holding an unanswered guardian field. `None` when no guardian
/// field remains to gate.
fn guardian_pseudo_candidate(session: &Session) -> Option<UnfilledField> {
    for (doc_name, doc) in &session.documents {
        for (field, value) in &doc.fields {
            if field.contains(GUARDIAN_PREFIX) && value.is_empty() {
                return Some(UnfilledField {
                    document: doc_name.clone(),
                    field: GUARDIAN_PSEUDO_FIELD.to_owned(),
                    description: GUARDIAN_EXISTS_QUESTION.to_owned(),
                });
            }
        }
    }
    None
}
