mod loader;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, warn};

use crate::category::Category;
use crate::errors::SchemaError;

pub use loader::parse_template;

/// One form template: field id -> default value (template order preserved)
/// plus the human-readable description attached to each field line.
#[derive(Clone, Debug, Default, Serialize)]
pub struct DocumentTemplate {
    pub fields: IndexMap<String, String>,
    pub descriptions: BTreeMap<String, String>,
}

/// Source of document templates for a category.
pub trait SchemaProvider: Send + Sync {
    fn load(&self, category: Category) -> Result<IndexMap<String, DocumentTemplate>, SchemaError>;
}

/// Loads templates from a directory tree: one folder per category, one
/// `.txt`/`.json` file per document. Overlay coordinate files (used by the
/// PDF rendering layer, not by this engine) are skipped by name.
#[derive(Clone, Debug)]
pub struct FsSchemaProvider {
    docs_dir: PathBuf,
}

impl FsSchemaProvider {
    pub fn new(docs_dir: impl Into<PathBuf>) -> Self {
        Self {
            docs_dir: docs_dir.into(),
        }
    }

    fn collect_template_files(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
        let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .collect();
        entries.sort();
        for path in entries {
            if path.is_dir() {
                Self::collect_template_files(&path, out)?;
            } else if is_template_file(&path) {
                out.push(path);
            }
        }
        Ok(())
    }
}

fn is_template_file(path: &Path) -> bool {
    let extension_ok = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("txt") | Some("json")
    );
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
    extension_ok && !stem.ends_with("_coords")
}

impl SchemaProvider for FsSchemaProvider {
    fn load(&self, category: Category) -> Result<IndexMap<String, DocumentTemplate>, SchemaError> {
        let folder = self.docs_dir.join(category.folder_name());
        if !folder.is_dir() {
            return Err(SchemaError::CategoryNotFound { category });
        }

        let mut files = Vec::new();
        Self::collect_template_files(&folder, &mut files).map_err(|source| {
            SchemaError::ReadDir {
                path: folder.clone(),
                source,
            }
        })?;

        let mut documents = IndexMap::new();
        for path in files {
            let content = match fs::read_to_string(&path) {
                Ok(content) => content,
                Err(error) => {
                    warn!(
                        event_name = "schema.template_unreadable",
                        path = %path.display(),
                        error = %error,
                        "skipping unreadable template file"
                    );
                    continue;
                }
            };
            match parse_template(&content) {
                Ok(template) => {
                    let name = path
                        .file_stem()
                        .and_then(|s| s.to_str())
                        .unwrap_or("document")
                        .to_owned();
                    debug!(
                        event_name = "schema.template_loaded",
                        document = %name,
                        field_count = template.fields.len(),
                        "template loaded"
                    );
                    documents.insert(name, template);
                }
                Err(error) => {
                    warn!(
                        event_name = "schema.template_unparseable",
                        path = %path.display(),
                        error = %error,
                        "skipping unparseable template file"
                    );
                }
            }
        }

        if documents.is_empty() {
            return Err(SchemaError::EmptyCategory { category });
        }
        Ok(documents)
    }
}
