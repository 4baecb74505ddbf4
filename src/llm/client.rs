//! Language model collaborators
//!
//! The model only ever produces text; turning that text into a command is
//! the resolver's job. `LlmClient` speaks either the Anthropic messages API
//! or an OpenAI-compatible chat completion API, picked from the endpoint URL.

use crate::core::config::LlmConfig;
use crate::core::error::{AgentError, Result};
use crate::llm::prompt::Prompt;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value};
use std::time::Duration;

const DEFAULT_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
const DEFAULT_MODEL: &str = "claude-3-haiku-20240307";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anything that turns a prompt into free text
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, prompt: &Prompt) -> Result<String>;
}

/// Wire format spoken by the endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Anthropic,
    /// OpenAI, DeepSeek and other `/chat/completions` servers
    OpenAiCompatible,
}

impl Provider {
    pub fn for_endpoint(url: &str) -> Self {
        if url.contains("anthropic.com") {
            Provider::Anthropic
        } else {
            Provider::OpenAiCompatible
        }
    }

    /// Request body carrying the prompt's system and user parts
    fn body(self, model: &str, prompt: &Prompt, settings: &LlmConfig) -> Value {
        match self {
            Provider::Anthropic => json!({
                "model": model,
                "max_tokens": settings.max_tokens,
                "temperature": settings.temperature,
                "system": prompt.system,
                "messages": [{ "role": "user", "content": prompt.user }],
            }),
            Provider::OpenAiCompatible => json!({
                "model": model,
                "max_tokens": settings.max_tokens,
                "temperature": settings.temperature,
                "messages": [
                    { "role": "system", "content": prompt.system },
                    { "role": "user", "content": prompt.user },
                ],
            }),
        }
    }

    fn authorize(self, request: RequestBuilder, api_key: &str) -> RequestBuilder {
        match self {
            Provider::Anthropic => request
                .header("x-api-key", api_key)
                .header("anthropic-version", ANTHROPIC_VERSION),
            Provider::OpenAiCompatible => request.bearer_auth(api_key),
        }
    }

    /// Text of the first reply block, if any
    fn reply_text(self, reply: &Value) -> Option<&str> {
        match self {
            Provider::Anthropic => reply
                .get("content")?
                .as_array()?
                .iter()
                .find_map(|block| block.get("text")?.as_str()),
            Provider::OpenAiCompatible => reply.pointer("/choices/0/message/content")?.as_str(),
        }
    }
}

/// HTTP client for a hosted chat model
pub struct LlmClient {
    http: Client,
    provider: Provider,
    endpoint: String,
    model: String,
    api_key: String,
    settings: LlmConfig,
}

impl LlmClient {
    pub fn new(api_key: String, endpoint: String, model: String, settings: LlmConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| AgentError::LlmError(e.to_string()))?;

        Ok(Self {
            http,
            provider: Provider::for_endpoint(&endpoint),
            endpoint,
            model,
            api_key,
            settings,
        })
    }

    /// Create a client from environment variables
    ///
    /// Required: LLM_API_KEY
    /// Optional: LLM_API_URL (defaults to Anthropic API)
    /// Optional: LLM_MODEL (defaults to claude-3-haiku-20240307)
    pub fn from_env(settings: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var("LLM_API_KEY")
            .map_err(|_| AgentError::LlmError("LLM_API_KEY not set".into()))?;
        let endpoint = std::env::var("LLM_API_URL").unwrap_or_else(|_| DEFAULT_ENDPOINT.into());
        let model = std::env::var("LLM_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into());

        Self::new(api_key, endpoint, model, settings.clone())
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LanguageModel for LlmClient {
    async fn generate(&self, prompt: &Prompt) -> Result<String> {
        let body = self.provider.body(&self.model, prompt, &self.settings);
        tracing::debug!(provider = ?self.provider, model = %self.model, message = %prompt.message, "Requesting completion");

        let request = self.http.post(&self.endpoint).json(&body);
        let response = self
            .provider
            .authorize(request, &self.api_key)
            .send()
            .await
            .map_err(|e| AgentError::LlmError(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AgentError::LlmError(e.to_string()))?;
        if !status.is_success() {
            return Err(AgentError::LlmError(format!("{}: {}", status, text.trim())));
        }

        let reply: Value = serde_json::from_str(&text)?;
        self.provider
            .reply_text(&reply)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from)
            .ok_or_else(|| AgentError::LlmError("completion contained no text".into()))
    }
}

/// Treats the player's own message as the model's answer
///
/// Used when no API key is configured: typing `findTrees({"maxCount": 2})`
/// drives the agent directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughModel;

#[async_trait]
impl LanguageModel for PassthroughModel {
    async fn generate(&self, prompt: &Prompt) -> Result<String> {
        Ok(prompt.message.clone())
    }
}
