use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde_json::json;
use tracing::info;

use civiform_agent::llm::{HttpLlmClient, LlmClient, ScriptedLlm};
use civiform_agent::orchestrator::FormAgent;
use civiform_core::config::AppConfig;
use civiform_core::{Category, FsSchemaProvider, InMemorySessionStore};

use super::CommandResult;

const SESSION_ID: &str = "cli-session";

/// Replays a script file (one citizen message per line, `#` comments and
/// blank lines skipped) through the agent, printing one JSON line per turn.
/// Without an API key the turns fall back to the deterministic questions,
/// which makes the command usable offline.
pub async fn run(config: &AppConfig, category: &str, script: &Path) -> CommandResult {
    let category: Category = match category.parse() {
        Ok(category) => category,
        Err(error) => return CommandResult::failure("chat", "bad-category", format!("{error}"), 2),
    };
    let lines = match fs::read_to_string(script) {
        Ok(content) => content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_owned)
            .collect::<Vec<_>>(),
        Err(error) => {
            return CommandResult::failure(
                "chat",
                "script-unreadable",
                format!("{}: {error}", script.display()),
                2,
            )
        }
    };

    let llm: Arc<dyn LlmClient> = if config.llm.api_key.is_some() {
        match HttpLlmClient::from_config(&config.llm) {
            Ok(client) => Arc::new(client),
            Err(error) => {
                return CommandResult::failure("chat", "llm-client", error.to_string(), 1)
            }
        }
    } else {
        info!(
            event_name = "cli.offline_mode",
            "no API key configured; using deterministic fallback turns"
        );
        Arc::new(ScriptedLlm::default())
    };

    let agent = FormAgent::new(
        Arc::new(FsSchemaProvider::new(config.schema.docs_dir.clone())),
        Arc::new(InMemorySessionStore::new(
            config.session.ttl(),
            config.session.history_limit,
        )),
        llm,
    );

    let opened = match agent.start(SESSION_ID, category).await {
        Ok(opened) => opened,
        Err(error) => return CommandResult::failure("chat", "start", error.to_string(), 1),
    };
    print_turn("assistant", &opened);

    for line in &lines {
        println!("{}", json!({"speaker": "citizen", "text": line}));
        match agent.chat(SESSION_ID, line).await {
            Ok(turn) => print_turn("assistant", &turn),
            Err(error) => return CommandResult::failure("chat", "turn", error.to_string(), 1),
        }
    }

    match agent.close(SESSION_ID).await {
        Ok(result) => CommandResult::success(
            "chat",
            serde_json::to_value(&result).unwrap_or_default(),
        ),
        Err(error) => CommandResult::failure("chat", "close", error.to_string(), 1),
    }
}

fn print_turn(speaker: &str, turn: &civiform_agent::orchestrator::TurnResponse) {
    println!(
        "{}",
        json!({
            "speaker": speaker,
            "text": turn.reply,
            "extracted": turn.extracted_fields,
            "progress": format!("{}/{}", turn.progress.filled, turn.progress.total),
            "completed": turn.completed,
            "awaiting_confirmation": turn.awaiting_confirmation,
        })
    );
}
