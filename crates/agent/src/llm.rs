use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use civiform_core::config::LlmConfig;

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Chat-completions client speaking the OpenAI-compatible wire format,
/// which Ollama and most gateway proxies also accept.
pub struct HttpLlmClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<secrecy::SecretString>,
    model: String,
    timeout: Duration,
    max_retries: u32,
}

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

impl HttpLlmClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let base_url = config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_owned();
        let http = reqwest::Client::builder()
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            endpoint: format!("{base_url}/chat/completions"),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            max_retries: config.max_retries,
        })
    }

    async fn request_once(&self, prompt: &str) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": 0.2,
        });

        let mut request = self.http.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| anyhow!("completion request timed out after {:?}", self.timeout))?
            .context("completion request failed")?
            .error_for_status()
            .context("completion endpoint returned an error status")?;

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .context("completion response was not valid JSON")?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("completion response contained no choices"))
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            match self.request_once(prompt).await {
                Ok(content) => return Ok(content),
                Err(error) => {
                    warn!(
                        event_name = "llm.request_failed",
                        attempt,
                        error = %error,
                        "completion attempt failed"
                    );
                    last_error = Some(error);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| anyhow!("completion failed with no attempts made")))
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

/// Deterministic stand-in that replays a fixed script of completions.
/// Used by tests and by the offline CLI demo; errors once exhausted,
/// which exercises the same fallback path as a real outage.
#[derive(Default)]
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<String>>,
}

impl ScriptedLlm {
    pub fn new(replies: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
        }
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        self.replies
            .lock()
            .expect("script lock poisoned")
            .pop_front()
            .ok_or_else(|| anyhow!("scripted completions exhausted"))
    }
}
