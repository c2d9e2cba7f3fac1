use serde::Serialize;
use tracing::info;

use crate::fields::resolve::GUARDIAN_PREFIX;
use crate::intents::{matches_any, GUARDIAN_NEGATIVE, GUARDIAN_POSITIVE};
use crate::session::{Session, NOT_APPLICABLE};

/// Gate over the guardian field cluster. Confirmed states are terminal for
/// the session's lifetime; the existence question is never re-evaluated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardianState {
    #[default]
    Unchecked,
    ConfirmedAbsent,
    ConfirmedPresent,
}

/// Classification of the citizen's reply to the existence question.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GuardianAnswer {
    Absent,
    Present,
    /// Matched both vocabularies or neither; the question is re-asked
    /// verbatim and the state stays `Unchecked`.
    Unclear,
}

pub fn classify_answer(utterance: &str) -> GuardianAnswer {
    let negative = matches_any(utterance, GUARDIAN_NEGATIVE);
    let positive = matches_any(utterance, GUARDIAN_POSITIVE);
    match (negative, positive) {
        (true, false) => GuardianAnswer::Absent,
        (false, true) => GuardianAnswer::Present,
        _ => GuardianAnswer::Unclear,
    }
}

/// Marks the guardian as absent and bulk-fills every currently-empty
/// guardian-prefixed field across all documents with `N/A` (counted as
/// filled transitions). Returns how many fields were filled.
pub fn confirm_absent(session: &mut Session) -> usize {
    session.guardian = GuardianState::ConfirmedAbsent;
    let mut filled = 0;
    for doc in session.documents.values_mut() {
        let guardian_fields: Vec<String> = doc
            .fields
            .iter()
            .filter(|(field, value)| field.contains(GUARDIAN_PREFIX) && value.is_empty())
            .map(|(field, _)| field.clone())
            .collect();
        for field in guardian_fields {
            doc.write_value(&field, NOT_APPLICABLE);
            filled += 1;
        }
    }
    info!(
        event_name = "guardian.confirmed_absent",
        session_id = %session.id,
        fields_filled = filled,
        "guardian absent; guardian fields marked not applicable"
    );
    filled
}

/// Marks the guardian as present; guardian fields are then asked one at a
/// time like any other field.
pub fn confirm_present(session: &mut Session) {
    session.guardian = GuardianState::ConfirmedPresent;
    info!(
        event_name = "guardian.confirmed_present",
        session_id = %session.id,
        "guardian present; guardian fields will be collected"
    );
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use super::{classify_answer, confirm_absent, confirm_present, GuardianAnswer, GuardianState};
    use crate::category::Category;
    use crate::schema::DocumentTemplate;
    use crate::session::{Session, NOT_APPLICABLE};

    fn session_with_guardian_fields() -> Session {
        let mut template = DocumentTemplate::default();
        for field in [
            "recipient.name",
            "guardian.name",
            "guardian.birthdate",
            "guardian.address",
        ] {
            template.fields.insert(field.to_owned(), String::new());
        }
        let mut templates = IndexMap::new();
        templates.insert("receipt".to_owned(), template);
        Session::new("sess-g", Category::YouthRentSubsidy, &templates)
    }

    #[test]
    fn negative_only_reply_is_absent() {
        assert_eq!(classify_answer("no guardian"), GuardianAnswer::Absent);
        assert_eq!(classify_answer("not applicable"), GuardianAnswer::Absent);
    }

    #[test]
    fn positive_only_reply_is_present() {
        assert_eq!(classify_answer("yes, my son"), GuardianAnswer::Present);
    }

    #[test]
    fn mixed_or_unrelated_reply_is_unclear() {
        assert_eq!(classify_answer("well, yes and no"), GuardianAnswer::Unclear);
        assert_eq!(classify_answer("what do you mean"), GuardianAnswer::Unclear);
    }

    #[test]
    fn confirm_absent_bulk_fills_empty_guardian_fields() {
        let mut session = session_with_guardian_fields();
        session
            .documents
            .get_mut("receipt")
            .unwrap()
            .write_value("guardian.name", "Lee");

        let filled = confirm_absent(&mut session);
        assert_eq!(filled, 2);
        assert_eq!(session.guardian, GuardianState::ConfirmedAbsent);

        let doc = &session.documents["receipt"];
        // Already-answered guardian field is never overwritten.
        assert_eq!(doc.value("guardian.name"), Some("Lee"));
        assert_eq!(doc.value("guardian.birthdate"), Some(NOT_APPLICABLE));
        assert_eq!(doc.value("guardian.address"), Some(NOT_APPLICABLE));
        // Non-guardian fields stay untouched.
        assert_eq!(doc.value("recipient.name"), Some(""));
        assert_eq!(doc.filled_count, 3);
    }

    #[test]
    fn confirm_present_fills_nothing() {
        let mut session = session_with_guardian_fields();
        confirm_present(&mut session);
        assert_eq!(session.guardian, GuardianState::ConfirmedPresent);
        assert_eq!(session.documents["receipt"].filled_count, 0);
    }
}
