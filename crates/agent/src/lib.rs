//! Conversational engine - LLM-backed slot filling over form documents
//!
//! This crate is the "voice" of the civiform system - the runtime that:
//! - Extracts field values from free-form citizen utterances
//! - Generates the next conversational question
//! - Validates every generated turn against the dialogue protocol
//! - Orchestrates sessions: start, chat turns, status, export, close
//!
//! # Architecture
//!
//! Each chat turn runs a constrained loop:
//! 1. **Slot Extraction** (`extract`) - Parse utterance -> field updates
//! 2. **State Update** (core crate) - Write, propagate, derive
//! 3. **Turn Generation** (`generate`) - Draft the next question
//! 4. **Protocol Validation** (core `validator`) - Accept or substitute
//!
//! # Safety Principle
//!
//! The LLM is strictly a translator and a phrasing engine. It NEVER decides
//! which field to ask next, whether a value propagates, or whether the form
//! is complete. Those are deterministic decisions made by the engine core.

pub mod extract;
pub mod generate;
pub mod llm;
pub mod orchestrator;
