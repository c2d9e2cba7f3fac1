use std::fs;
use std::path::PathBuf;

use civiform_cli::commands::{chat, schema};
use civiform_core::config::{AppConfig, ConfigOverrides, LoadOptions};

const DELEGATION: &str = r#"{
    "delegator.name": "", //name of the person delegating
    "delegator.address": "" //address of the person delegating
}"#;

fn config_for(docs_dir: PathBuf) -> AppConfig {
    AppConfig::load(LoadOptions {
        config_path: Some("does-not-exist.toml".into()),
        require_file: false,
        overrides: ConfigOverrides {
            docs_dir: Some(docs_dir),
            ..ConfigOverrides::default()
        },
    })
    .expect("config should load from defaults")
}

fn write_schema(dir: &std::path::Path) {
    let folder = dir.join("4_monthly");
    fs::create_dir(&folder).unwrap();
    fs::write(folder.join("delegation.txt"), DELEGATION).unwrap();
}

#[test]
fn schema_command_reports_documents_as_json() {
    let dir = tempfile::tempdir().unwrap();
    write_schema(dir.path());
    let config = config_for(dir.path().to_path_buf());

    let result = schema::run(&config, "youth-rent-subsidy", None);
    assert_eq!(result.exit_code, 0);
    assert!(result.output.contains("\"status\":\"ok\""));
    assert!(result.output.contains("\"document\":\"delegation\""));
    assert!(result.output.contains("\"fields\":2"));
}

#[test]
fn schema_command_rejects_unknown_categories() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(dir.path().to_path_buf());

    let result = schema::run(&config, "lottery-winnings", None);
    assert_eq!(result.exit_code, 2);
    assert!(result.output.contains("bad-category"));
}

#[tokio::test]
async fn chat_command_replays_a_script_offline() {
    let dir = tempfile::tempdir().unwrap();
    write_schema(dir.path());
    let script = dir.path().join("answers.txt");
    fs::write(
        &script,
        "# scripted citizen answers\nplease skip this one\nyes\n",
    )
    .unwrap();
    let config = config_for(dir.path().to_path_buf());

    let result = chat::run(&config, "youth-rent-subsidy", &script).await;
    assert_eq!(result.exit_code, 0);
    assert!(result.output.contains("\"status\":\"ok\""));
    assert!(result.output.contains("\"completed\":true"));
}

#[tokio::test]
async fn chat_command_fails_cleanly_without_a_script() {
    let dir = tempfile::tempdir().unwrap();
    write_schema(dir.path());
    let config = config_for(dir.path().to_path_buf());

    let result = chat::run(&config, "youth-rent-subsidy", &dir.path().join("missing.txt")).await;
    assert_eq!(result.exit_code, 2);
    assert!(result.output.contains("script-unreadable"));
}
