use std::path::PathBuf;

use serde_json::json;

use civiform_core::config::AppConfig;
use civiform_core::{Category, FsSchemaProvider, SchemaProvider};

use super::CommandResult;

pub fn run(config: &AppConfig, category: &str, docs_dir: Option<PathBuf>) -> CommandResult {
    let category: Category = match category.parse() {
        Ok(category) => category,
        Err(error) => {
            return CommandResult::failure("schema", "bad-category", format!("{error}"), 2)
        }
    };
    let docs_dir = docs_dir.unwrap_or_else(|| config.schema.docs_dir.clone());
    let provider = FsSchemaProvider::new(docs_dir);

    match provider.load(category) {
        Ok(documents) => {
            let report: Vec<_> = documents
                .iter()
                .map(|(name, template)| {
                    json!({
                        "document": name,
                        "fields": template.fields.len(),
                        "described": template.descriptions.len(),
                    })
                })
                .collect();
            CommandResult::success(
                "schema",
                json!({
                    "category": category.slug(),
                    "documents": report,
                }),
            )
        }
        Err(error) => CommandResult::failure("schema", "schema-load", error.to_string(), 1),
    }
}
