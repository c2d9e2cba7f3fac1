use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::ChatHistory;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub schema: SchemaConfig,
    pub llm: LlmConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct SchemaConfig {
    /// Root of the per-category template folders.
    pub docs_dir: PathBuf,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Idle time after which a session is eligible for eviction.
    pub ttl_secs: u64,
    /// Dialogue turns kept per session for the generation context.
    pub history_limit: usize,
}

impl SessionConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    OpenAi,
    Anthropic,
    Ollama,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

/// Programmatic overrides, applied after file and environment values.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub docs_dir: Option<PathBuf>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_base_url: Option<String>,
    pub session_ttl_secs: Option<u64>,
    pub history_limit: Option<usize>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

const DEFAULT_CONFIG_PATH: &str = "civiform.toml";
const ENV_PREFIX: &str = "CIVIFORM_";

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    schema: FileSchema,
    #[serde(default)]
    llm: FileLlm,
    #[serde(default)]
    session: FileSession,
    #[serde(default)]
    logging: FileLogging,
}

#[derive(Debug, Default, Deserialize)]
struct FileSchema {
    docs_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct FileLlm {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct FileSession {
    ttl_secs: Option<u64>,
    history_limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct FileLogging {
    level: Option<String>,
    format: Option<LogFormat>,
}

impl AppConfig {
    /// Precedence, lowest to highest: built-in defaults, config file,
    /// `CIVIFORM_*` environment variables, programmatic overrides.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let path = options
            .config_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

        let file = match fs::read_to_string(&path) {
            Ok(raw) => toml::from_str::<FileConfig>(&raw).map_err(|source| {
                ConfigError::ParseFile {
                    path: path.clone(),
                    source,
                }
            })?,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                if options.require_file {
                    return Err(ConfigError::MissingConfigFile(path));
                }
                FileConfig::default()
            }
            Err(source) => return Err(ConfigError::ReadFile { path, source }),
        };

        let mut config = Self::from_file(file);
        config.apply_env()?;
        config.apply_overrides(options.overrides);
        config.validate()?;
        Ok(config)
    }

    fn from_file(file: FileConfig) -> Self {
        Self {
            schema: SchemaConfig {
                docs_dir: file.schema.docs_dir.unwrap_or_else(|| "schemas".into()),
            },
            llm: LlmConfig {
                provider: file.llm.provider.unwrap_or(LlmProvider::OpenAi),
                api_key: file.llm.api_key.map(SecretString::from),
                base_url: file.llm.base_url,
                model: file.llm.model.unwrap_or_else(|| "gpt-4o-mini".to_owned()),
                timeout_secs: file.llm.timeout_secs.unwrap_or(30),
                max_retries: file.llm.max_retries.unwrap_or(2),
            },
            session: SessionConfig {
                ttl_secs: file.session.ttl_secs.unwrap_or(30 * 60),
                history_limit: file
                    .session
                    .history_limit
                    .unwrap_or(ChatHistory::DEFAULT_LIMIT),
            },
            logging: LoggingConfig {
                level: file.logging.level.unwrap_or_else(|| "info".to_owned()),
                format: file.logging.format.unwrap_or(LogFormat::Compact),
            },
        }
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("DOCS_DIR") {
            self.schema.docs_dir = PathBuf::from(value);
        }
        if let Some(value) = read_env("LLM_PROVIDER") {
            self.llm.provider = match value.as_str() {
                "open_ai" | "openai" => LlmProvider::OpenAi,
                "anthropic" => LlmProvider::Anthropic,
                "ollama" => LlmProvider::Ollama,
                _ => {
                    return Err(ConfigError::InvalidEnvOverride {
                        key: format!("{ENV_PREFIX}LLM_PROVIDER"),
                        value,
                    })
                }
            };
        }
        if let Some(value) = read_env("LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("LLM_API_KEY") {
            self.llm.api_key = Some(SecretString::from(value));
        }
        if let Some(value) = read_env("LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("SESSION_TTL_SECS") {
            self.session.ttl_secs = value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
                key: format!("{ENV_PREFIX}SESSION_TTL_SECS"),
                value,
            })?;
        }
        if let Some(value) = read_env("HISTORY_LIMIT") {
            self.session.history_limit =
                value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
                    key: format!("{ENV_PREFIX}HISTORY_LIMIT"),
                    value,
                })?;
        }
        if let Some(value) = read_env("LOG_LEVEL") {
            self.logging.level = value;
        }
        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(docs_dir) = overrides.docs_dir {
            self.schema.docs_dir = docs_dir;
        }
        if let Some(provider) = overrides.llm_provider {
            self.llm.provider = provider;
        }
        if let Some(model) = overrides.llm_model {
            self.llm.model = model;
        }
        if let Some(api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(SecretString::from(api_key));
        }
        if let Some(base_url) = overrides.llm_base_url {
            self.llm.base_url = Some(base_url);
        }
        if let Some(ttl_secs) = overrides.session_ttl_secs {
            self.session.ttl_secs = ttl_secs;
        }
        if let Some(history_limit) = overrides.history_limit {
            self.session.history_limit = history_limit;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::Validation(
                "llm.model must not be empty".to_owned(),
            ));
        }
        if self.llm.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "llm.timeout_secs must be positive".to_owned(),
            ));
        }
        if self.session.history_limit < 2 {
            return Err(ConfigError::Validation(
                "session.history_limit must keep at least one exchange".to_owned(),
            ));
        }
        if self.session.ttl_secs == 0 {
            return Err(ConfigError::Validation(
                "session.ttl_secs must be positive".to_owned(),
            ));
        }
        Ok(())
    }
}

fn read_env(suffix: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}{suffix}"))
        .ok()
        .filter(|value| !value.is_empty())
}
