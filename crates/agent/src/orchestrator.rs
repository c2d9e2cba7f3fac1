//! Session orchestration: the turn loop tying schema, state, extraction,
//! generation and validation together. Every state transition here is
//! deterministic; the LLM only supplies values and phrasing.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{info, warn};

use civiform_core::errors::EngineError;
use civiform_core::guardian::{classify_answer, confirm_absent, confirm_present, GuardianAnswer};
use civiform_core::intents::{wants_revision, wants_skip};
use civiform_core::session::{is_real_value, Session, NOT_APPLICABLE};
use civiform_core::{
    back_fill_groups, remaining_field_count, unfilled_fields, update_field, Category, ChatTurn,
    SchemaProvider, SessionStore, TurnValidator, UnfilledField, GUARDIAN_EXISTS_QUESTION,
    GUARDIAN_PSEUDO_FIELD,
};

use crate::extract::{SlotExtractor, MAX_TARGET_FIELDS};
use crate::generate::{DialogueGenerator, GenerationContext};
use crate::llm::LlmClient;

/// One chat turn's outcome, as returned to the caller (CLI or a future
/// transport layer).
#[derive(Clone, Debug, Serialize)]
pub struct TurnResponse {
    pub reply: String,
    pub extracted_fields: BTreeMap<String, String>,
    pub progress: FormProgress,
    pub unfilled_count: usize,
    pub completed: bool,
    pub awaiting_confirmation: bool,
    pub edit_mode: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct FormProgress {
    pub filled: usize,
    pub total: usize,
    pub documents: Vec<DocumentProgress>,
}

#[derive(Clone, Debug, Serialize)]
pub struct DocumentProgress {
    pub document: String,
    pub filled: usize,
    pub total: usize,
}

/// Final export of a session's field values, per document.
#[derive(Clone, Debug, Serialize)]
pub struct FormResult {
    pub session_id: String,
    pub category: Category,
    pub completed: bool,
    pub documents: IndexMap<String, IndexMap<String, String>>,
}

const SUMMARY_MAX_ITEMS: usize = 8;
const SUMMARY_FIELDS_PER_DOCUMENT: usize = 10;
const SUMMARY_VALUE_CHARS: usize = 30;

pub struct FormAgent {
    schema: Arc<dyn SchemaProvider>,
    store: Arc<dyn SessionStore>,
    extractor: SlotExtractor,
    generator: DialogueGenerator,
    validator: TurnValidator,
}

impl FormAgent {
    pub fn new(
        schema: Arc<dyn SchemaProvider>,
        store: Arc<dyn SessionStore>,
        llm: Arc<dyn LlmClient>,
    ) -> Self {
        Self {
            schema,
            store,
            extractor: SlotExtractor::new(Arc::clone(&llm)),
            generator: DialogueGenerator::new(llm),
            validator: TurnValidator,
        }
    }

    /// Creates a session for the category and returns the opening question.
    /// Starting an id that already exists replaces the previous session.
    pub async fn start(
        &self,
        session_id: &str,
        category: Category,
    ) -> Result<TurnResponse, EngineError> {
        let templates = self.schema.load(category)?;
        let mut session = Session::new(session_id, category, &templates);
        // Candidate count after group collapsing, not the raw sum of
        // template sizes. Fixed here and reused for progress figures.
        session.initial_total_fields = remaining_field_count(&session);

        let unfilled = unfilled_fields(&session);
        let opening = match unfilled.first() {
            Some(first) => format!(
                "Hello! I'll help you fill out the {} forms. {}",
                category.display_name(),
                question_for(first)
            ),
            // Every field ships pre-filled; jump straight to review.
            None => build_summary(&session),
        };
        if unfilled.is_empty() {
            session.final_confirmation_shown = true;
        }
        let awaiting_confirmation = session.final_confirmation_shown;
        let progress = progress_of(&session);
        let unfilled_count = unfilled.len();

        let handle = self.store.insert(session);
        let mut entry = handle.lock().await;
        entry.history.push_assistant(opening.clone());
        info!(
            event_name = "agent.session_started",
            session_id,
            category = %category,
            documents = progress.documents.len(),
            "session created"
        );

        Ok(TurnResponse {
            reply: opening,
            extracted_fields: BTreeMap::new(),
            progress,
            unfilled_count,
            completed: false,
            awaiting_confirmation,
            edit_mode: false,
        })
    }

    /// Runs one full dialogue turn. Turns for the same session id are
    /// serialized on the session's entry lock.
    pub async fn chat(
        &self,
        session_id: &str,
        utterance: &str,
    ) -> Result<TurnResponse, EngineError> {
        let handle = self
            .store
            .get(session_id)
            .ok_or_else(|| EngineError::SessionNotFound {
                session_id: session_id.to_owned(),
            })?;
        let mut guard = handle.lock().await;
        let entry = &mut *guard;
        entry.touch();

        if entry.session.completed {
            return Ok(turn(
                &entry.session,
                "Your forms are already complete. Start a new session to begin another application.".to_owned(),
                BTreeMap::new(),
                0,
                false,
                false,
            ));
        }

        // Confirmation stage: the summary has been shown and the citizen is
        // answering it.
        if entry.session.final_confirmation_shown {
            entry.history.push_user(utterance);
            if wants_revision(utterance) {
                entry.session.final_confirmation_shown = false;
                let reply = "Of course. Which value should I correct? Please tell me the field and the new value.".to_owned();
                entry.history.push_assistant(&reply);
                info!(
                    event_name = "agent.edit_mode_entered",
                    session_id, "citizen requested a revision at confirmation"
                );
                return Ok(turn(
                    &entry.session,
                    reply,
                    BTreeMap::new(),
                    0,
                    false,
                    true,
                ));
            }
            entry.session.completed = true;
            let reply = format!(
                "Thank you! Your {} forms are complete and ready to submit. Good luck with your application!",
                entry.session.category.display_name()
            );
            entry.history.push_assistant(&reply);
            info!(
                event_name = "agent.session_completed",
                session_id, "citizen confirmed the summary"
            );
            return Ok(turn(&entry.session, reply, BTreeMap::new(), 0, false, false));
        }

        let history_snapshot: Vec<ChatTurn> = entry.history.turns().to_vec();
        let last_question = entry.history.last_question().map(ToOwned::to_owned);
        entry.history.push_user(utterance);

        let candidates = unfilled_fields(&entry.session);

        // The guardian existence question is answered yes/no, never
        // extracted from.
        if candidates
            .first()
            .is_some_and(|c| c.field == GUARDIAN_PSEUDO_FIELD)
        {
            let reply = self.handle_guardian_answer(&mut entry.session, utterance);
            entry.history.push_assistant(&reply);
            let awaiting = entry.session.final_confirmation_shown;
            let remaining = unfilled_fields(&entry.session).len();
            return Ok(turn(
                &entry.session,
                reply,
                BTreeMap::new(),
                remaining,
                awaiting,
                false,
            ));
        }

        // Edit turn: nothing is unfilled, so corrections may target any
        // field. Otherwise extraction focuses on the current document's
        // pending fields.
        let targets = if candidates.is_empty() {
            editable_fields(&entry.session)
        } else {
            extraction_targets(&entry.session, &candidates)
        };
        let extracted = self
            .extractor
            .extract(utterance, &targets, last_question.as_deref())
            .await;
        let applied = apply_updates(&mut entry.session, &candidates, extracted);

        // A "skip" reply with nothing extracted marks the next few pending
        // fields as not applicable.
        let mut skipped = false;
        if applied.is_empty() && !candidates.is_empty() && wants_skip(utterance) {
            for candidate in candidates.iter().take(MAX_TARGET_FIELDS) {
                update_field(
                    &mut entry.session,
                    &candidate.document,
                    &candidate.field,
                    NOT_APPLICABLE,
                );
            }
            skipped = true;
            info!(
                event_name = "agent.fields_skipped",
                session_id,
                count = candidates.len().min(MAX_TARGET_FIELDS),
                "pending fields marked not applicable on request"
            );
        }

        let unfilled = unfilled_fields(&entry.session);
        entry.session.current_document = unfilled
            .first()
            .map(|c| c.document.clone())
            .or(entry.session.current_document.clone());

        if unfilled.is_empty() {
            entry.session.final_confirmation_shown = true;
            let reply = build_summary(&entry.session);
            entry.history.push_assistant(&reply);
            return Ok(turn(&entry.session, reply, applied, 0, true, false));
        }

        let reply = if skipped {
            format!(
                "No problem, I've marked those as not applicable. {}",
                question_for(&unfilled[0])
            )
        } else {
            self.generate_turn(entry, &unfilled, &applied, utterance, &history_snapshot)
                .await
        };
        entry.history.push_assistant(&reply);
        let remaining = unfilled.len();
        Ok(turn(&entry.session, reply, applied, remaining, false, false))
    }

    /// Per-document fill counts plus the overall tally.
    pub async fn status(&self, session_id: &str) -> Result<FormProgress, EngineError> {
        let handle = self
            .store
            .get(session_id)
            .ok_or_else(|| EngineError::SessionNotFound {
                session_id: session_id.to_owned(),
            })?;
        let entry = handle.lock().await;
        Ok(progress_of(&entry.session))
    }

    /// Exports the current field values after a defensive group back-fill.
    pub async fn result(&self, session_id: &str) -> Result<FormResult, EngineError> {
        let handle = self
            .store
            .get(session_id)
            .ok_or_else(|| EngineError::SessionNotFound {
                session_id: session_id.to_owned(),
            })?;
        let mut entry = handle.lock().await;
        back_fill_groups(&mut entry.session);
        Ok(result_of(&entry.session))
    }

    /// Removes the session and returns its final state.
    pub async fn close(&self, session_id: &str) -> Result<FormResult, EngineError> {
        let handle = self
            .store
            .remove(session_id)
            .ok_or_else(|| EngineError::SessionNotFound {
                session_id: session_id.to_owned(),
            })?;
        let mut entry = handle.lock().await;
        back_fill_groups(&mut entry.session);
        info!(event_name = "agent.session_closed", session_id, "session removed");
        Ok(result_of(&entry.session))
    }

    fn handle_guardian_answer(&self, session: &mut Session, utterance: &str) -> String {
        match classify_answer(utterance) {
            GuardianAnswer::Absent => {
                confirm_absent(session);
                let unfilled = unfilled_fields(session);
                match unfilled.first() {
                    Some(next) => format!(
                        "Understood, I've marked the guardian items as not applicable. {}",
                        question_for(next)
                    ),
                    None => {
                        session.final_confirmation_shown = true;
                        build_summary(session)
                    }
                }
            }
            GuardianAnswer::Present => {
                confirm_present(session);
                let unfilled = unfilled_fields(session);
                match unfilled.first() {
                    Some(next) => format!("Noted. {}", question_for(next)),
                    None => {
                        session.final_confirmation_shown = true;
                        build_summary(session)
                    }
                }
            }
            GuardianAnswer::Unclear => GUARDIAN_EXISTS_QUESTION.to_owned(),
        }
    }

    async fn generate_turn(
        &self,
        entry: &civiform_core::SessionEntry,
        unfilled: &[UnfilledField],
        applied: &BTreeMap<String, String>,
        utterance: &str,
        history: &[ChatTurn],
    ) -> String {
        let session = &entry.session;
        let filled = session.filled_manifest();
        let just_extracted: Vec<(String, String)> = applied
            .iter()
            .map(|(field, value)| {
                let description = session
                    .describe_field(field)
                    .unwrap_or(field.as_str())
                    .to_owned();
                (description, value.clone())
            })
            .collect();
        let context = GenerationContext {
            category: session.category,
            unfilled,
            filled: &filled,
            just_extracted: &just_extracted,
            history,
            utterance,
        };

        let filled_descriptions: Vec<String> =
            filled.iter().map(|(description, _)| description.clone()).collect();
        match self.generator.next_turn(&context).await {
            Ok(draft) => match self.validator.evaluate(&draft, unfilled, &filled_descriptions) {
                Ok(()) => draft,
                Err(violation) => {
                    let failure = EngineError::from(violation);
                    warn!(
                        event_name = "agent.turn_rejected",
                        session_id = %session.id,
                        error = %failure,
                        "generated turn discarded; asking the fallback question"
                    );
                    self.validator.fallback_question(unfilled)
                }
            },
            Err(error) => {
                warn!(
                    event_name = "agent.generation_failed",
                    session_id = %session.id,
                    error = %error,
                    "generation call failed; asking the fallback question"
                );
                self.validator.fallback_question(unfilled)
            }
        }
    }
}

fn turn(
    session: &Session,
    reply: String,
    extracted_fields: BTreeMap<String, String>,
    unfilled_count: usize,
    awaiting_confirmation: bool,
    edit_mode: bool,
) -> TurnResponse {
    TurnResponse {
        reply,
        extracted_fields,
        progress: progress_of(session),
        unfilled_count,
        completed: session.completed,
        awaiting_confirmation,
        edit_mode,
    }
}

fn progress_of(session: &Session) -> FormProgress {
    let documents: Vec<DocumentProgress> = session
        .documents
        .iter()
        .map(|(document, doc)| DocumentProgress {
            document: document.clone(),
            filled: doc.filled_count,
            total: doc.total_count,
        })
        .collect();
    // Top-level figures count logical questions (groups collapsed), so a
    // shared value answered once moves progress by one, not per document.
    FormProgress {
        filled: session
            .initial_total_fields
            .saturating_sub(remaining_field_count(session)),
        total: session.initial_total_fields,
        documents,
    }
}

fn result_of(session: &Session) -> FormResult {
    FormResult {
        session_id: session.id.clone(),
        category: session.category,
        completed: session.completed,
        documents: session
            .documents
            .iter()
            .map(|(name, doc)| (name.clone(), doc.fields.clone()))
            .collect(),
    }
}

/// Pending fields reordered so the current document's candidates come
/// first, capped to the extraction window.
fn extraction_targets(session: &Session, candidates: &[UnfilledField]) -> Vec<UnfilledField> {
    let current = session.current_document.as_deref();
    let mut targets: Vec<UnfilledField> = candidates
        .iter()
        .filter(|c| Some(c.document.as_str()) == current)
        .cloned()
        .collect();
    targets.extend(
        candidates
            .iter()
            .filter(|c| Some(c.document.as_str()) != current)
            .cloned(),
    );
    targets.truncate(MAX_TARGET_FIELDS);
    targets
}

/// Every concrete, non-derived field as a correction target.
fn editable_fields(session: &Session) -> Vec<UnfilledField> {
    let mut fields = Vec::new();
    for (doc_name, doc) in &session.documents {
        for field in doc.fields.keys() {
            if civiform_core::fields::resolve::is_derived_field(field) {
                continue;
            }
            fields.push(UnfilledField {
                document: doc_name.clone(),
                field: field.clone(),
                description: doc.description(field).to_owned(),
            });
        }
    }
    fields
}

/// Writes each extracted value, preferring the document the candidate was
/// resolved on and falling back to whichever document carries the field.
fn apply_updates(
    session: &mut Session,
    candidates: &[UnfilledField],
    extracted: BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut applied = BTreeMap::new();
    for (field, value) in extracted {
        let preferred = candidates
            .iter()
            .find(|c| c.field == field)
            .map(|c| c.document.clone());
        let mut written = false;
        if let Some(document) = preferred {
            written = update_field(session, &document, &field, &value);
        }
        if !written {
            let documents: Vec<String> = session.documents.keys().cloned().collect();
            for document in documents {
                if update_field(session, &document, &field, &value) {
                    written = true;
                    break;
                }
            }
        }
        if written {
            applied.insert(field, value);
        }
    }
    applied
}

fn question_for(candidate: &UnfilledField) -> String {
    if candidate.field == GUARDIAN_PSEUDO_FIELD {
        return GUARDIAN_EXISTS_QUESTION.to_owned();
    }
    let lowered = candidate.description.trim().to_lowercase();
    for article in ["the ", "a ", "an ", "your "] {
        if let Some(rest) = lowered.strip_prefix(article) {
            return format!("What is your {rest}?");
        }
    }
    format!("What is your {lowered}?")
}

/// The confirmation summary: up to eight real values drawn from the first
/// ten fields of each document, values cut at thirty characters.
fn build_summary(session: &Session) -> String {
    let mut items: Vec<(String, String)> = Vec::new();
    for doc in session.documents.values() {
        for (field, value) in doc.fields.iter().take(SUMMARY_FIELDS_PER_DOCUMENT) {
            if is_real_value(value) {
                items.push((doc.description(field).to_owned(), value.clone()));
            }
        }
    }

    let mut summary = String::from("Here is a summary of what you've provided:\n");
    for (description, value) in items.iter().take(SUMMARY_MAX_ITEMS) {
        let mut display: String = value.chars().take(SUMMARY_VALUE_CHARS).collect();
        if value.chars().count() > SUMMARY_VALUE_CHARS {
            display.push_str("...");
        }
        let _ = writeln!(summary, "- {description}: {display}");
    }
    if items.len() > SUMMARY_MAX_ITEMS {
        let _ = writeln!(summary, "- and {} more", items.len() - SUMMARY_MAX_ITEMS);
    }
    summary.push_str(
        "\nIs everything correct? Say yes to finish, or tell me what needs to change.",
    );
    summary
}
