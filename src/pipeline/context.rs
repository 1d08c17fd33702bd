//! Capability handles and tunables injected into the orchestrator.

use std::sync::Arc;

use crate::embedding::Embedder;
use crate::intent::{LexicalParser, UtteranceParser};
use crate::llm::{ReasoningEngine, RequestOptions};
use crate::prompt::DEFAULT_MAX_ENTITIES;
use crate::retrieval::{DEFAULT_TASK_TOP_K, DEFAULT_TIME_BLOCK_TOP_K};

/// Tunables for one orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    /// Task candidates retrieved per turn.
    pub task_top_k: usize,
    /// Time-block candidates retrieved per turn.
    pub time_block_top_k: usize,
    /// Cap on tasks + time blocks rendered into the agent prompt.
    pub max_entities: usize,
    /// Options for every reasoning call (JSON output is always forced).
    pub request_options: RequestOptions,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            task_top_k: DEFAULT_TASK_TOP_K,
            time_block_top_k: DEFAULT_TIME_BLOCK_TOP_K,
            max_entities: DEFAULT_MAX_ENTITIES,
            request_options: RequestOptions::new(),
        }
    }
}

/// The capabilities a turn may call, passed explicitly rather than held in
/// globals so tests can substitute fakes.
#[derive(Clone)]
pub struct PipelineContext {
    pub reasoner: Arc<dyn ReasoningEngine>,
    pub embedder: Arc<dyn Embedder>,
    /// `None` disables the pattern router: every turn takes the agent path.
    pub parser: Option<Arc<dyn UtteranceParser>>,
    pub settings: PipelineSettings,
}

impl std::fmt::Debug for PipelineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineContext")
            .field("reasoner", &self.reasoner.name())
            .field("embedder", &self.embedder.name())
            .field("parser", &self.parser.as_ref().map(|p| p.name().to_owned()))
            .field("settings", &self.settings)
            .finish()
    }
}

impl PipelineContext {
    /// Context with the built-in lexical parser and default settings.
    pub fn new(reasoner: Arc<dyn ReasoningEngine>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            reasoner,
            embedder,
            parser: Some(Arc::new(LexicalParser::new())),
            settings: PipelineSettings::default(),
        }
    }

    #[must_use]
    pub fn with_parser(mut self, parser: Option<Arc<dyn UtteranceParser>>) -> Self {
        self.parser = parser;
        self
    }

    #[must_use]
    pub fn with_settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }
}
