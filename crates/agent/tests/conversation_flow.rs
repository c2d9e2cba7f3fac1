//! End-to-end conversation scenarios over a fixed schema and a scripted
//! completion client.

use std::sync::Arc;

use indexmap::IndexMap;

use civiform_agent::llm::ScriptedLlm;
use civiform_agent::orchestrator::FormAgent;
use civiform_core::errors::{EngineError, SchemaError};
use civiform_core::{
    Category, DocumentTemplate, InMemorySessionStore, SchemaProvider, GUARDIAN_EXISTS_QUESTION,
};

struct FixedSchema {
    templates: IndexMap<String, DocumentTemplate>,
}

impl SchemaProvider for FixedSchema {
    fn load(&self, _category: Category) -> Result<IndexMap<String, DocumentTemplate>, SchemaError> {
        Ok(self.templates.clone())
    }
}

fn template(fields: &[(&str, &str)]) -> DocumentTemplate {
    let mut template = DocumentTemplate::default();
    for (field, description) in fields {
        template.fields.insert((*field).to_owned(), String::new());
        template
            .descriptions
            .insert((*field).to_owned(), (*description).to_owned());
    }
    template
}

fn agent_with(
    templates: IndexMap<String, DocumentTemplate>,
    script: impl IntoIterator<Item = &'static str>,
) -> FormAgent {
    FormAgent::new(
        Arc::new(FixedSchema { templates }),
        Arc::new(InMemorySessionStore::default()),
        Arc::new(ScriptedLlm::new(script)),
    )
}

fn subsidy_templates() -> IndexMap<String, DocumentTemplate> {
    let mut templates = IndexMap::new();
    templates.insert(
        "delegation".to_owned(),
        template(&[
            ("delegator.name", "name of the person delegating"),
            ("delegator.address", "address of the person delegating"),
        ]),
    );
    templates.insert(
        "receipt".to_owned(),
        template(&[
            ("recipient.name", "name of the recipient"),
            ("recipient.mobile", "mobile number of the recipient"),
        ]),
    );
    templates
}

#[tokio::test]
async fn shared_name_is_asked_once_and_fills_both_documents() {
    let agent = agent_with(
        subsidy_templates(),
        [
            r#"{"delegator.name": "Dana Lee"}"#,
            "Thanks, Dana! What is your address?",
            r#"{"delegator.address": "12 Main Street", "recipient.mobile": "010-9999-8888"}"#,
        ],
    );

    let opened = agent.start("sess-1", Category::YouthRentSubsidy).await.unwrap();
    assert!(opened.reply.contains("name of the person delegating"));
    // The two name fields collapse into one candidate.
    assert_eq!(opened.unfilled_count, 3);

    let first = agent.chat("sess-1", "My name is Dana Lee").await.unwrap();
    assert_eq!(first.extracted_fields["delegator.name"], "Dana Lee");
    assert!(!first.completed);
    // One logical question answered out of three.
    assert_eq!(first.progress.filled, 1);
    assert_eq!(first.progress.total, 3);
    // Propagation filled the receipt's copy too.
    let receipt = first
        .progress
        .documents
        .iter()
        .find(|d| d.document == "receipt")
        .unwrap();
    assert_eq!(receipt.filled, 1);

    let second = agent
        .chat(
            "sess-1",
            "I live at 12 Main Street and my mobile is 010-9999-8888",
        )
        .await
        .unwrap();
    assert!(second.awaiting_confirmation);
    assert!(!second.completed);
    assert!(second.reply.contains("summary"));

    // First confirmation shows the summary; only the second completes.
    let third = agent.chat("sess-1", "Yes, everything looks good").await.unwrap();
    assert!(third.completed);

    let result = agent.result("sess-1").await.unwrap();
    assert_eq!(result.documents["delegation"]["delegator.name"], "Dana Lee");
    assert_eq!(result.documents["receipt"]["recipient.name"], "Dana Lee");
    assert_eq!(
        result.documents["receipt"]["recipient.mobile"],
        "010-9999-8888"
    );
}

#[tokio::test]
async fn revision_request_reenters_edit_mode_and_applies_the_correction() {
    let agent = agent_with(
        subsidy_templates(),
        [
            r#"{"delegator.name": "Dana Lee", "delegator.address": "12 Main Street", "recipient.mobile": "010-9999-8888"}"#,
            r#"{"delegator.address": "99 Oak Avenue"}"#,
        ],
    );

    agent.start("sess-2", Category::YouthRentSubsidy).await.unwrap();
    let filled = agent
        .chat(
            "sess-2",
            "Dana Lee, 12 Main Street, mobile 010-9999-8888",
        )
        .await
        .unwrap();
    assert!(filled.awaiting_confirmation);

    let revision = agent
        .chat("sess-2", "Wait, I need to change my address")
        .await
        .unwrap();
    assert!(revision.edit_mode);
    assert!(!revision.completed);

    let corrected = agent
        .chat("sess-2", "My address is 99 Oak Avenue")
        .await
        .unwrap();
    assert!(corrected.awaiting_confirmation);
    assert_eq!(corrected.extracted_fields["delegator.address"], "99 Oak Avenue");

    let done = agent.chat("sess-2", "Yes, that's right").await.unwrap();
    assert!(done.completed);

    let result = agent.close("sess-2").await.unwrap();
    assert!(result.completed);
    assert_eq!(
        result.documents["delegation"]["delegator.address"],
        "99 Oak Avenue"
    );
    // Closed sessions are gone.
    assert!(matches!(
        agent.status("sess-2").await,
        Err(EngineError::SessionNotFound { .. })
    ));
}

#[tokio::test]
async fn guardian_branch_and_skip_vocabulary() {
    let mut templates = IndexMap::new();
    templates.insert(
        "receipt".to_owned(),
        template(&[
            ("recipient.name", "name of the recipient"),
            ("guardian.name", "name of the legal guardian"),
            ("guardian.address", "address of the legal guardian"),
        ]),
    );
    // Guardian and skip turns never call the LLM; extraction on the skip
    // turn fails over an empty script to an empty update set.
    let agent = agent_with(templates, []);

    let opened = agent.start("sess-3", Category::YouthRentSubsidy).await.unwrap();
    assert!(opened.reply.ends_with(GUARDIAN_EXISTS_QUESTION));

    // Ambiguous answer re-asks verbatim.
    let unclear = agent.chat("sess-3", "maybe?").await.unwrap();
    assert_eq!(unclear.reply, GUARDIAN_EXISTS_QUESTION);

    let absent = agent.chat("sess-3", "No guardian").await.unwrap();
    assert!(absent.reply.contains("name of the recipient"));
    // Both guardian fields were bulk-filled with N/A.
    assert_eq!(absent.progress.filled, 2);

    let skipped = agent.chat("sess-3", "I don't know").await.unwrap();
    assert!(skipped.awaiting_confirmation);

    let done = agent.chat("sess-3", "yes, finish it").await.unwrap();
    assert!(done.completed);

    let result = agent.result("sess-3").await.unwrap();
    assert_eq!(result.documents["receipt"]["guardian.name"], "N/A");
    assert_eq!(result.documents["receipt"]["recipient.name"], "N/A");
}

#[tokio::test]
async fn invalid_generated_turn_is_replaced_by_the_fallback() {
    let agent = agent_with(
        subsidy_templates(),
        [
            r#"{"delegator.name": "Dana Lee"}"#,
            // Premature completion while fields remain; must be replaced.
            "Great, everything is finished. Thank you for your time!",
        ],
    );

    agent.start("sess-4", Category::YouthRentSubsidy).await.unwrap();
    let turn = agent.chat("sess-4", "I'm Dana Lee").await.unwrap();
    assert!(turn.reply.starts_with("Understood. What is"));
    assert!(!turn.completed);
}

#[tokio::test]
async fn chat_on_unknown_session_is_an_error() {
    let agent = agent_with(subsidy_templates(), []);
    assert!(matches!(
        agent.chat("missing", "hello").await,
        Err(EngineError::SessionNotFound { .. })
    ));
}
