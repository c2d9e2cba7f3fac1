//! Field updates and their two side effects: common-group propagation and
//! derived-period recalculation. `update_field` is idempotent; re-applying
//! the same update never changes state beyond the first application and
//! never overwrites an existing answer.

use tracing::debug;

use crate::category::common_field_groups;
use crate::errors::EngineError;
use crate::session::{is_real_value, Session};

/// Field-name fragments that trigger a period recalculation attempt.
const PERIOD_TRIGGERS: &[&str] = &[
    "start_year",
    "start_month",
    "end_year",
    "end_month",
    "start_date",
    "end_date",
];

/// Writes `value` into `document.field`, maintains the filled count,
/// back-fills the value into empty members of the field's equivalence
/// group across every document, and recomputes any derived period the
/// field participates in. Returns false when the field does not exist on
/// the named document.
pub fn update_field(session: &mut Session, document: &str, field: &str, value: &str) -> bool {
    let Some(doc) = session.documents.get_mut(document) else {
        return false;
    };
    if !doc.write_value(field, value) {
        return false;
    }
    debug!(
        event_name = "fields.updated",
        session_id = %session.id,
        document,
        field,
        "field value written"
    );

    propagate_common(session, field, value);
    recalculate_period(session, document, field);
    true
}

/// Copies `value` into every other currently-empty member of the source
/// field's group, across all documents. Existing answers, including `N/A`,
/// are never overwritten.
fn propagate_common(session: &mut Session, source_field: &str, value: &str) {
    let groups = common_field_groups(session.category);
    let Some(group) = groups.iter().find(|group| group.contains(&source_field)) else {
        return;
    };

    for (doc_name, doc) in session.documents.iter_mut() {
        for member in *group {
            if *member == source_field {
                continue;
            }
            if doc.value(member).is_some_and(str::is_empty) {
                doc.write_value(member, value);
                debug!(
                    event_name = "fields.group_propagated",
                    document = %doc_name,
                    field = member,
                    "group member back-filled"
                );
            }
        }
    }
}

/// Derived-period calculation: when all of `p.start_year`, `p.start_month`,
/// `p.end_year`, `p.end_month` and `p.total_months` exist on the same
/// document and the four inputs parse as integers,
/// `total_months = (end_year - start_year) * 12 + (end_month - start_month)`
/// clamped at zero. Non-numeric input skips silently; the next relevant
/// update retries.
fn recalculate_period(session: &mut Session, document: &str, changed_field: &str) {
    if !PERIOD_TRIGGERS
        .iter()
        .any(|trigger| changed_field.contains(trigger))
    {
        return;
    }
    let Some((prefix, _)) = changed_field.rsplit_once('.') else {
        return;
    };
    let Some(doc) = session.documents.get_mut(document) else {
        return;
    };

    let input_fields = [
        format!("{prefix}.start_year"),
        format!("{prefix}.start_month"),
        format!("{prefix}.end_year"),
        format!("{prefix}.end_month"),
    ];
    let total_field = format!("{prefix}.total_months");
    if !doc.fields.contains_key(&total_field)
        || input_fields.iter().any(|f| !doc.fields.contains_key(f))
    {
        return;
    }

    let mut inputs = [0i64; 4];
    for (slot, field) in inputs.iter_mut().zip(&input_fields) {
        let raw = doc.value(field).unwrap_or_default();
        if raw.is_empty() {
            return;
        }
        match raw.trim().parse::<i64>() {
            Ok(parsed) => *slot = parsed,
            Err(_) => {
                let failure = EngineError::DerivedComputeFailure {
                    field: total_field.clone(),
                    detail: format!("non-numeric input `{raw}` in `{field}`"),
                };
                debug!(
                    event_name = "fields.period_skip",
                    document,
                    error = %failure,
                    "derived field left unset"
                );
                return;
            }
        }
    }

    let [start_year, start_month, end_year, end_month] = inputs;
    let total_months = ((end_year - start_year) * 12 + (end_month - start_month)).max(0);
    doc.write_value(&total_field, &total_months.to_string());
    debug!(
        event_name = "fields.period_derived",
        document,
        field = %total_field,
        total_months,
        "derived period computed"
    );
}

/// Defensive second propagation pass applied before export: for every
/// group, the first real value found (document-then-member order) is
/// copied into every still-empty member everywhere.
pub fn back_fill_groups(session: &mut Session) {
    let groups = common_field_groups(session.category);
    for group in groups {
        let mut source: Option<String> = None;
        'search: for doc in session.documents.values() {
            for member in *group {
                if let Some(value) = doc.value(member) {
                    if is_real_value(value) {
                        source = Some(value.to_owned());
                        break 'search;
                    }
                }
            }
        }
        let Some(value) = source else {
            continue;
        };
        for doc in session.documents.values_mut() {
            for member in *group {
                if doc.value(member).is_some_and(str::is_empty) {
                    doc.write_value(member, &value);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use super::{back_fill_groups, update_field};
    use crate::category::Category;
    use crate::schema::DocumentTemplate;
    use crate::session::{Session, NOT_APPLICABLE};

    fn template(fields: &[&str]) -> DocumentTemplate {
        let mut template = DocumentTemplate::default();
        for field in fields {
            template.fields.insert((*field).to_owned(), String::new());
        }
        template
    }

    fn subsidy_session() -> Session {
        let mut templates = IndexMap::new();
        templates.insert(
            "delegation".to_owned(),
            template(&["delegator.name", "delegator.address"]),
        );
        templates.insert(
            "receipt".to_owned(),
            template(&[
                "recipient.name",
                "recipient.address",
                "receive_period.start_year",
                "receive_period.start_month",
                "receive_period.end_year",
                "receive_period.end_month",
                "receive_period.total_months",
            ]),
        );
        Session::new("sess-u", Category::YouthRentSubsidy, &templates)
    }

    #[test]
    fn update_propagates_to_empty_group_members() {
        let mut session = subsidy_session();
        assert!(update_field(
            &mut session,
            "delegation",
            "delegator.name",
            "Dana Lee"
        ));

        assert_eq!(
            session.documents["receipt"].value("recipient.name"),
            Some("Dana Lee")
        );
        assert_eq!(session.documents["delegation"].filled_count, 1);
        assert_eq!(session.documents["receipt"].filled_count, 1);
    }

    #[test]
    fn propagation_never_overwrites_an_answer() {
        let mut session = subsidy_session();
        update_field(&mut session, "receipt", "recipient.address", NOT_APPLICABLE);
        update_field(&mut session, "delegation", "delegator.address", "12 Main St");

        // The receipt copy already held N/A and keeps it.
        assert_eq!(
            session.documents["receipt"].value("recipient.address"),
            Some(NOT_APPLICABLE)
        );
    }

    #[test]
    fn update_is_idempotent() {
        let mut session = subsidy_session();
        update_field(&mut session, "delegation", "delegator.name", "Dana Lee");
        let snapshot = format!("{session:?}");
        update_field(&mut session, "delegation", "delegator.name", "Dana Lee");
        assert_eq!(snapshot, format!("{session:?}"));
    }

    #[test]
    fn unknown_document_or_field_is_rejected() {
        let mut session = subsidy_session();
        assert!(!update_field(&mut session, "nonexistent", "a.b", "x"));
        assert!(!update_field(
            &mut session,
            "delegation",
            "recipient.name",
            "x"
        ));
    }

    #[test]
    fn period_is_derived_once_all_inputs_are_numeric() {
        let mut session = subsidy_session();
        update_field(&mut session, "receipt", "receive_period.start_year", "2024");
        update_field(&mut session, "receipt", "receive_period.start_month", "01");
        update_field(&mut session, "receipt", "receive_period.end_year", "2024");
        assert_eq!(
            session.documents["receipt"].value("receive_period.total_months"),
            Some("")
        );

        update_field(&mut session, "receipt", "receive_period.end_month", "03");
        assert_eq!(
            session.documents["receipt"].value("receive_period.total_months"),
            Some("2")
        );
    }

    #[test]
    fn negative_periods_clamp_to_zero() {
        let mut session = subsidy_session();
        update_field(&mut session, "receipt", "receive_period.start_year", "2024");
        update_field(&mut session, "receipt", "receive_period.start_month", "05");
        update_field(&mut session, "receipt", "receive_period.end_year", "2024");
        update_field(&mut session, "receipt", "receive_period.end_month", "01");
        assert_eq!(
            session.documents["receipt"].value("receive_period.total_months"),
            Some("0")
        );
    }

    #[test]
    fn non_numeric_period_input_fails_silently() {
        let mut session = subsidy_session();
        update_field(&mut session, "receipt", "receive_period.start_year", "2024");
        update_field(&mut session, "receipt", "receive_period.start_month", "01");
        update_field(&mut session, "receipt", "receive_period.end_year", "2024");
        update_field(
            &mut session,
            "receipt",
            "receive_period.end_month",
            "March",
        );
        assert_eq!(
            session.documents["receipt"].value("receive_period.total_months"),
            Some("")
        );

        // A corrected update retries the computation.
        update_field(&mut session, "receipt", "receive_period.end_month", "03");
        assert_eq!(
            session.documents["receipt"].value("receive_period.total_months"),
            Some("2")
        );
    }

    #[test]
    fn back_fill_copies_real_values_only() {
        let mut session = subsidy_session();
        // Write directly, bypassing propagation, to simulate a half-filled
        // session needing the defensive pass.
        session
            .documents
            .get_mut("receipt")
            .unwrap()
            .write_value("recipient.name", "Dana Lee");
        session
            .documents
            .get_mut("delegation")
            .unwrap()
            .write_value("delegator.address", NOT_APPLICABLE);

        back_fill_groups(&mut session);

        assert_eq!(
            session.documents["delegation"].value("delegator.name"),
            Some("Dana Lee")
        );
        // N/A is not a real value and must not propagate.
        assert_eq!(
            session.documents["receipt"].value("recipient.address"),
            Some("")
        );
    }
}
