pub mod chat;
pub mod schema;

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    payload: Value,
}

impl CommandResult {
    pub fn success(command: &str, payload: Value) -> Self {
        let outcome = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            payload,
        };
        Self {
            exit_code: 0,
            output: serialize_outcome(outcome),
        }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let outcome = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            payload: Value::String(message.into()),
        };
        Self {
            exit_code,
            output: serialize_outcome(outcome),
        }
    }
}

fn serialize_outcome(outcome: CommandOutcome) -> String {
    serde_json::to_string(&outcome).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"payload\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}
