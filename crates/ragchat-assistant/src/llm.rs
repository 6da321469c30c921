//! Chat model seam and an OpenAI-compatible HTTP client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use ragchat_core::config::LlmSettings;
use ragchat_core::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: "assistant".to_string(), content: content.into() }
    }
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    fn name(&self) -> &str;

    /// Fail fast (before any retrieval) when the model cannot be called at all.
    async fn ensure_ready(&self) -> Result<()>;

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

pub struct OpenAiChatModel {
    client: reqwest::Client,
    settings: LlmSettings,
}

impl OpenAiChatModel {
    /// The credential is not read here; see [`ChatModel::ensure_ready`].
    pub fn new(settings: LlmSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::Configuration(format!("building HTTP client: {e}")))?;
        Ok(Self { client, settings })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.settings.base_url.trim_end_matches('/'))
    }

    async fn send(&self, api_key: &str, messages: &[ChatMessage]) -> Result<String> {
        let body = json!({
            "model": self.settings.model,
            "messages": messages,
            "temperature": self.settings.temperature,
            "stream": false,
        });

        let res = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(Error::ModelCall {
                status: Some(status.as_u16()),
                message: format!("{} returned {}: {}", self.endpoint(), status, text.trim()),
            });
        }

        let payload: Value = res.json().await.map_err(|e| Error::ModelCall {
            status: Some(status.as_u16()),
            message: format!("invalid completion response: {e}"),
        })?;
        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Error::ModelCall {
                status: Some(status.as_u16()),
                message: "completion response has no message content".to_string(),
            })
    }

    fn transport_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::ModelTimeout(self.settings.timeout())
        } else {
            Error::ModelCall { status: e.status().map(|s| s.as_u16()), message: e.to_string() }
        }
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    fn name(&self) -> &str {
        &self.settings.model
    }

    async fn ensure_ready(&self) -> Result<()> {
        self.settings.api_key().map(|_| ())
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let api_key = self.settings.api_key()?;
        let timeout = self.settings.timeout();
        debug!(model = %self.settings.model, messages = messages.len(), "chat completion");
        match tokio::time::timeout(timeout, self.send(&api_key, messages)).await {
            Ok(result) => result,
            Err(_) => Err(Error::ModelTimeout(timeout)),
        }
    }
}
