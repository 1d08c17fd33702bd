//! Configuration types for the task assistant.
//!
//! Loaded from TOML, then overridden from the environment:
//!
//! | Variable | Field |
//! |---|---|
//! | `OPENAI_API_KEY` | `llm.api_key`, `embedding.api_key` (when empty) |
//! | `TASKWISE_LLM_MODEL` | `llm.model` |
//! | `TASKWISE_EMBEDDING_MODEL` | `embedding.model` |
//! | `TASKWISE_HOST` | `server.host` |
//! | `TASKWISE_PORT` | `server.port` |

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::embedding::{OpenAiEmbedder, OpenAiEmbeddingConfig};
use crate::error::{AssistantError, Result};
use crate::llm::openai::DEFAULT_BASE_URL;
use crate::llm::{OpenAiChatEngine, OpenAiConfig, RequestOptions};
use crate::pipeline::{PipelineContext, PipelineSettings};
use crate::prompt::DEFAULT_MAX_ENTITIES;
use crate::retrieval::{DEFAULT_TASK_TOP_K, DEFAULT_TIME_BLOCK_TOP_K};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Reasoning engine settings.
    pub llm: LlmConfig,
    /// Embedding engine settings.
    pub embedding: EmbeddingConfig,
    /// Candidate retrieval settings.
    pub retrieval: RetrievalConfig,
    /// Pattern router settings.
    pub router: RouterConfig,
    /// Agent prompt settings.
    pub prompt: PromptConfig,
    /// HTTP server settings.
    pub server: ServerConfig,
}

/// Chat-completions model configuration.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible API.
    pub api_url: String,
    /// Model identifier.
    pub model: String,
    /// API key. Usually supplied through `OPENAI_API_KEY`.
    pub api_key: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Maximum tokens per completion (None = provider default).
    pub max_tokens: Option<usize>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Retries after a transient failure (timeout, 429, 5xx).
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_BASE_URL.to_owned(),
            model: "gpt-4.1-nano".to_owned(),
            api_key: String::new(),
            temperature: 0.0,
            max_tokens: None,
            timeout_secs: 60,
            max_retries: 1,
        }
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("api_key", &redacted(&self.api_key))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

/// Embeddings model configuration.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub api_url: String,
    pub model: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_BASE_URL.to_owned(),
            model: "text-embedding-3-small".to_owned(),
            api_key: String::new(),
            timeout_secs: 30,
        }
    }
}

impl std::fmt::Debug for EmbeddingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingConfig")
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("api_key", &redacted(&self.api_key))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

fn redacted(key: &str) -> &'static str {
    if key.is_empty() { "<unset>" } else { "<redacted>" }
}

/// How many candidates retrieval returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub task_top_k: usize,
    pub time_block_top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            task_top_k: DEFAULT_TASK_TOP_K,
            time_block_top_k: DEFAULT_TIME_BLOCK_TOP_K,
        }
    }
}

/// Pattern router configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// When false every turn goes to the general agent.
    pub enabled: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Agent prompt configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    /// Requests with more tasks + time blocks than this are rejected.
    pub max_entities: usize,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            max_entities: DEFAULT_MAX_ENTITIES,
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins. `"*"` allows any origin.
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 8000,
            cors_origins: vec!["*".to_owned()],
        }
    }
}

impl AssistantConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| AssistantError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| AssistantError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `<config dir>/taskwise/config.toml`.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("taskwise")
            .join("config.toml")
    }

    /// Load from `path` if given, else from the default path if it exists,
    /// else defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit or existing default file cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let default = Self::default_config_path();
                if default.exists() {
                    Self::from_file(&default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any variable source.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get("OPENAI_API_KEY") {
            if self.llm.api_key.is_empty() {
                self.llm.api_key.clone_from(&key);
            }
            if self.embedding.api_key.is_empty() {
                self.embedding.api_key = key;
            }
        }
        if let Some(model) = get("TASKWISE_LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(model) = get("TASKWISE_EMBEDDING_MODEL") {
            self.embedding.model = model;
        }
        if let Some(host) = get("TASKWISE_HOST") {
            self.server.host = host;
        }
        if let Some(port) = get("TASKWISE_PORT").and_then(|p| p.trim().parse().ok()) {
            self.server.port = port;
        }
    }

    /// Check the configuration can serve requests.
    ///
    /// # Errors
    ///
    /// Returns [`AssistantError::Config`] naming the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.llm.api_key.trim().is_empty() {
            return Err(AssistantError::Config(
                "llm.api_key is empty (set OPENAI_API_KEY)".to_owned(),
            ));
        }
        if self.embedding.api_key.trim().is_empty() {
            return Err(AssistantError::Config(
                "embedding.api_key is empty (set OPENAI_API_KEY)".to_owned(),
            ));
        }
        if self.llm.model.trim().is_empty() || self.embedding.model.trim().is_empty() {
            return Err(AssistantError::Config("model names must not be empty".to_owned()));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(AssistantError::Config(format!(
                "llm.temperature {} is outside 0.0..=2.0",
                self.llm.temperature
            )));
        }
        if self.prompt.max_entities == 0 {
            return Err(AssistantError::Config(
                "prompt.max_entities must be positive".to_owned(),
            ));
        }
        Ok(())
    }

    /// Pipeline tunables derived from this configuration.
    pub fn pipeline_settings(&self) -> PipelineSettings {
        let mut request_options = RequestOptions::new().with_temperature(self.llm.temperature);
        if let Some(max_tokens) = self.llm.max_tokens {
            request_options = request_options.with_max_tokens(max_tokens);
        }
        PipelineSettings {
            task_top_k: self.retrieval.task_top_k,
            time_block_top_k: self.retrieval.time_block_top_k,
            max_entities: self.prompt.max_entities,
            request_options,
        }
    }

    /// Build the OpenAI-backed capability handles.
    ///
    /// # Errors
    ///
    /// Returns [`AssistantError::Llm`] if an adapter rejects its settings.
    pub fn build_context(&self) -> Result<PipelineContext> {
        let reasoner = OpenAiChatEngine::new(
            OpenAiConfig::new(&self.llm.api_key, &self.llm.model)
                .with_base_url(&self.llm.api_url)
                .with_timeout(Duration::from_secs(self.llm.timeout_secs))
                .with_max_retries(self.llm.max_retries),
        )?;
        let embedder = OpenAiEmbedder::new(
            OpenAiEmbeddingConfig::new(&self.embedding.api_key, &self.embedding.model)
                .with_base_url(&self.embedding.api_url)
                .with_timeout(Duration::from_secs(self.embedding.timeout_secs)),
        )?;

        let ctx = PipelineContext::new(Arc::new(reasoner), Arc::new(embedder))
            .with_settings(self.pipeline_settings());
        Ok(if self.router.enabled {
            ctx
        } else {
            ctx.with_parser(None)
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_reference_backend() {
        let config = AssistantConfig::default();
        assert_eq!(config.llm.model, "gpt-4.1-nano");
        assert_eq!(config.llm.temperature, 0.0);
        assert_eq!(config.llm.max_retries, 1);
        assert_eq!(config.embedding.model, "text-embedding-3-small");
        assert_eq!(config.retrieval.task_top_k, 5);
        assert_eq!(config.retrieval.time_block_top_k, 3);
        assert_eq!(config.prompt.max_entities, 500);
        assert_eq!(config.server.port, 8000);
        assert!(config.router.enabled);
    }

    #[test]
    fn round_trips_through_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = AssistantConfig::default();
        config.retrieval.task_top_k = 8;
        config.server.cors_origins = vec!["http://localhost:3000".into()];
        config.save_to_file(&path).unwrap();

        let loaded = AssistantConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[retrieval]\ntask_top_k = 2\n").unwrap();

        let loaded = AssistantConfig::from_file(&path).unwrap();
        assert_eq!(loaded.retrieval.task_top_k, 2);
        assert_eq!(loaded.retrieval.time_block_top_k, 3);
        assert_eq!(loaded.llm.model, "gpt-4.1-nano");
    }

    #[test]
    fn from_file_invalid_toml_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "this is not valid toml {{{").unwrap();
        assert!(matches!(
            AssistantConfig::from_file(&path),
            Err(AssistantError::Config(_))
        ));
    }

    #[test]
    fn from_file_nonexistent_returns_io_error() {
        let result = AssistantConfig::from_file(Path::new("/nonexistent/path/config.toml"));
        assert!(matches!(result, Err(AssistantError::Io(_))));
    }

    #[test]
    fn default_config_path_ends_with_config_toml() {
        let path = AssistantConfig::default_config_path();
        assert!(path.ends_with("taskwise/config.toml"));
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = AssistantConfig::default();
        config.apply_overrides(env(&[
            ("OPENAI_API_KEY", "sk-env"),
            ("TASKWISE_LLM_MODEL", "gpt-4.1-mini"),
            ("TASKWISE_PORT", "9001"),
            ("TASKWISE_HOST", "0.0.0.0"),
        ]));
        assert_eq!(config.llm.api_key, "sk-env");
        assert_eq!(config.embedding.api_key, "sk-env");
        assert_eq!(config.llm.model, "gpt-4.1-mini");
        assert_eq!(config.server.port, 9001);
        assert_eq!(config.server.host, "0.0.0.0");
    }

    #[test]
    fn env_key_does_not_replace_file_key() {
        let mut config = AssistantConfig::default();
        config.llm.api_key = "sk-file".into();
        config.apply_overrides(env(&[("OPENAI_API_KEY", "sk-env"), ("TASKWISE_PORT", "nope")]));
        assert_eq!(config.llm.api_key, "sk-file");
        assert_eq!(config.embedding.api_key, "sk-env");
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn validate_requires_api_keys() {
        let mut config = AssistantConfig::default();
        assert!(config.validate().is_err());
        config.apply_overrides(env(&[("OPENAI_API_KEY", "sk-test")]));
        assert!(config.validate().is_ok());
        config.llm.temperature = 3.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn debug_redacts_keys() {
        let mut config = AssistantConfig::default();
        config.llm.api_key = "sk-secret".into();
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn pipeline_settings_carry_tunables() {
        let mut config = AssistantConfig::default();
        config.llm.max_tokens = Some(700);
        config.retrieval.task_top_k = 7;
        let settings = config.pipeline_settings();
        assert_eq!(settings.task_top_k, 7);
        assert_eq!(settings.request_options.max_tokens, Some(700));
        assert_eq!(settings.request_options.temperature, Some(0.0));
    }

    #[test]
    fn build_context_respects_router_switch() {
        let mut config = AssistantConfig::default();
        config.apply_overrides(env(&[("OPENAI_API_KEY", "sk-test")]));
        assert!(config.build_context().unwrap().parser.is_some());
        config.router.enabled = false;
        assert!(config.build_context().unwrap().parser.is_none());
    }
}
