pub mod category;
pub mod config;
pub mod errors;
pub mod fields;
pub mod guardian;
pub mod intents;
pub mod schema;
pub mod session;
pub mod store;
pub mod validator;

pub use category::{common_field_groups, Category};
pub use errors::{EngineError, SchemaError, TemplateParseError};
pub use fields::resolve::{
    remaining_field_count, unfilled_fields, UnfilledField, GUARDIAN_EXISTS_QUESTION,
    GUARDIAN_PREFIX, GUARDIAN_PSEUDO_FIELD,
};
pub use fields::update::{back_fill_groups, update_field};
pub use guardian::{GuardianAnswer, GuardianState};
pub use schema::{DocumentTemplate, FsSchemaProvider, SchemaProvider};
pub use session::{ChatHistory, ChatTurn, DocumentState, Session, Speaker, NOT_APPLICABLE};
pub use store::{InMemorySessionStore, SessionEntry, SessionHandle, SessionStore};
pub use validator::{TurnValidator, ValidationViolation};
