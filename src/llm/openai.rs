//! OpenAI chat-completions reasoning engine.
//!
//! Talks to any OpenAI-compatible `/v1/chat/completions` endpoint in
//! non-streaming mode. JSON output is requested with
//! `response_format: {"type": "json_object"}`. Transient failures (see
//! [`LlmError::is_retryable`]) are retried up to
//! [`OpenAiConfig::max_retries`] times with a linear backoff.
//!
//! ```rust,no_run
//! use taskwise::llm::openai::{OpenAiChatEngine, OpenAiConfig};
//! use taskwise::llm::{Message, ReasoningEngine, RequestOptions};
//!
//! # async fn example() -> Result<(), taskwise::llm::LlmError> {
//! let engine = OpenAiChatEngine::new(OpenAiConfig::new("sk-...", "gpt-4.1-nano"))?;
//! let reply = engine
//!     .generate_json(&[Message::user("Reply with {}")], &RequestOptions::new())
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::engine::ReasoningEngine;
use super::error::LlmError;
use super::message::{Message, Role};
use super::types::{OutputFormat, RequestOptions};
use crate::observability::FIELD_ERROR_CODE;

/// Default OpenAI API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Delay before the first retry; each further retry waits one step longer.
pub const RETRY_BACKOFF_MS: u64 = 250;

/// Configuration for the OpenAI chat engine.
#[derive(Clone)]
pub struct OpenAiConfig {
    /// API key for authentication.
    pub api_key: String,
    /// Base URL (defaults to `https://api.openai.com`).
    pub base_url: String,
    /// The model to use.
    pub model: String,
    /// Per-request timeout. `None` leaves the client default.
    pub timeout: Option<Duration>,
    /// Extra attempts after a retryable failure.
    pub max_retries: u32,
}

impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

impl OpenAiConfig {
    /// Create a new config with the given API key and model.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.into(),
            model: model.into(),
            timeout: None,
            max_retries: 0,
        }
    }

    /// Set a custom base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_owned();
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set how many times a retryable failure is retried.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// Build a `reqwest` client honoring an optional timeout.
pub(crate) fn build_http_client(timeout: Option<Duration>) -> Result<reqwest::Client, LlmError> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder
        .build()
        .map_err(|e| LlmError::ConfigError(format!("HTTP client init failed: {e}")))
}

/// Build the JSON request body for the Chat Completions API.
pub fn build_completions_request(
    model: &str,
    messages: &[Message],
    options: &RequestOptions,
) -> serde_json::Value {
    let mut body = serde_json::json!({
        "model": model,
        "messages": messages.iter().map(message_to_openai).collect::<Vec<_>>(),
    });

    if let Some(obj) = body.as_object_mut() {
        if let Some(max_tokens) = options.max_tokens {
            obj.insert("max_tokens".into(), serde_json::json!(max_tokens));
        }
        if let Some(temp) = options.temperature {
            obj.insert("temperature".into(), serde_json::json!(temp));
        }
        if options.output_format == OutputFormat::JsonObject {
            obj.insert(
                "response_format".into(),
                serde_json::json!({"type": "json_object"}),
            );
        }
    }

    body
}

fn message_to_openai(msg: &Message) -> serde_json::Value {
    let role = match msg.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    };
    serde_json::json!({ "role": role, "content": msg.content })
}

/// Pull `choices[0].message.content` out of a completions response.
pub fn extract_completion_text(body: &serde_json::Value) -> Result<String, LlmError> {
    body.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_owned)
        .ok_or_else(|| {
            LlmError::ResponseError("completion response has no choices[0].message.content".into())
        })
}

/// Map an HTTP error status to the appropriate [`LlmError`].
pub(crate) fn map_http_error(service: &str, status: reqwest::StatusCode, body: &str) -> LlmError {
    let message = extract_error_message(body);
    match status.as_u16() {
        401 | 403 => LlmError::AuthError(format!("{service} authentication failed: {message}")),
        429 => LlmError::RequestError(format!("{service} rate limited: {message}")),
        _ => LlmError::ProviderError(format!("{service} HTTP {}: {message}", status.as_u16())),
    }
}

/// Extract an error message from an OpenAI error response body.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| body.to_string())
}

/// Reasoning engine backed by the OpenAI Chat Completions API.
pub struct OpenAiChatEngine {
    config: OpenAiConfig,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiChatEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiChatEngine")
            .field("model", &self.config.model)
            .field("base_url", &self.config.base_url)
            .finish()
    }
}

impl OpenAiChatEngine {
    /// Create a new engine with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::ConfigError`] if the model name is empty or the
    /// HTTP client cannot be built.
    pub fn new(config: OpenAiConfig) -> Result<Self, LlmError> {
        if config.model.trim().is_empty() {
            return Err(LlmError::ConfigError("chat model name is empty".into()));
        }
        let client = build_http_client(config.timeout)?;
        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.config.base_url)
    }

    async fn complete_once(&self, body: &serde_json::Value) -> Result<String, LlmError> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| LlmError::from_transport("OpenAI", &e))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(map_http_error("OpenAI", status, &body_text));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::ResponseError(format!("OpenAI response was not JSON: {e}")))?;
        extract_completion_text(&json)
    }
}

#[async_trait]
impl ReasoningEngine for OpenAiChatEngine {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate_text(
        &self,
        messages: &[Message],
        options: &RequestOptions,
    ) -> Result<String, LlmError> {
        let body = build_completions_request(&self.config.model, messages, options);
        debug!(
            model = %self.config.model,
            messages = messages.len(),
            format = ?options.output_format,
            "sending chat completion request"
        );

        let mut attempt = 0;
        loop {
            match self.complete_once(&body).await {
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    warn!(attempt, { FIELD_ERROR_CODE } = e.code(), "chat completion failed, retrying: {e}");
                    tokio::time::sleep(Duration::from_millis(
                        RETRY_BACKOFF_MS * u64::from(attempt),
                    ))
                    .await;
                }
                result => return result,
            }
        }
    }
}
