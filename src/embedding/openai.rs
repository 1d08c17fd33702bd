//! OpenAI embeddings adapter (`POST /v1/embeddings`).

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::Embedder;
use crate::llm::LlmError;
use crate::llm::openai::{DEFAULT_BASE_URL, build_http_client, map_http_error};

/// Configuration for the OpenAI embedder.
#[derive(Clone)]
pub struct OpenAiEmbeddingConfig {
    /// API key for authentication.
    pub api_key: String,
    /// Base URL (defaults to `https://api.openai.com`).
    pub base_url: String,
    /// Embedding model (e.g. `text-embedding-3-small`).
    pub model: String,
    /// Per-request timeout.
    pub timeout: Option<Duration>,
}

impl std::fmt::Debug for OpenAiEmbeddingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEmbeddingConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl OpenAiEmbeddingConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.into(),
            model: model.into(),
            timeout: None,
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_owned();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

/// Put embeddings back into request order and check the count.
fn order_embeddings(mut data: Vec<EmbeddingDatum>, expected: usize) -> Result<Vec<Vec<f32>>, LlmError> {
    if data.len() != expected {
        return Err(LlmError::ResponseError(format!(
            "expected {expected} embeddings, got {}",
            data.len()
        )));
    }
    data.sort_by_key(|d| d.index);
    Ok(data.into_iter().map(|d| d.embedding).collect())
}

/// Embedder backed by the OpenAI embeddings endpoint.
pub struct OpenAiEmbedder {
    config: OpenAiEmbeddingConfig,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEmbedder")
            .field("model", &self.config.model)
            .finish()
    }
}

impl OpenAiEmbedder {
    /// Create a new embedder.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::ConfigError`] if the model is empty or the HTTP
    /// client cannot be built.
    pub fn new(config: OpenAiEmbeddingConfig) -> Result<Self, LlmError> {
        if config.model.trim().is_empty() {
            return Err(LlmError::ConfigError("embedding model name is empty".into()));
        }
        let client = build_http_client(config.timeout)?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn name(&self) -> &str {
        "openai"
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(model = %self.config.model, inputs = texts.len(), "requesting embeddings");

        let body = serde_json::json!({
            "model": self.config.model,
            "input": texts,
        });
        let response = self
            .client
            .post(format!("{}/v1/embeddings", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::from_transport("OpenAI embeddings", &e))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(map_http_error("OpenAI embeddings", status, &body_text));
        }

        let parsed: EmbeddingResponse = response.json().await.map_err(|e| {
            LlmError::ResponseError(format!("embedding response could not be decoded: {e}"))
        })?;
        order_embeddings(parsed.data, texts.len())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn embeddings_reordered_by_index() {
        let data = vec![
            EmbeddingDatum {
                index: 1,
                embedding: vec![2.0],
            },
            EmbeddingDatum {
                index: 0,
                embedding: vec![1.0],
            },
        ];
        let ordered = order_embeddings(data, 2).unwrap();
        assert_eq!(ordered, vec![vec![1.0], vec![2.0]]);
    }

    #[test]
    fn embedding_count_mismatch_is_error() {
        let data = vec![EmbeddingDatum {
            index: 0,
            embedding: vec![1.0],
        }];
        let err = order_embeddings(data, 3).unwrap_err();
        assert_eq!(err.code(), "RESPONSE_INVALID");
    }

    #[test]
    fn empty_model_rejected() {
        assert!(OpenAiEmbedder::new(OpenAiEmbeddingConfig::new("k", "")).is_err());
    }
}
