//! Pattern router: recognises high-confidence intents without a model call.
//!
//! # Submodules
//!
//! - [`parser`]: tokenizer and the [`UtteranceParser`] capability
//! - [`rules`]: trigger lexicons and longest-span matching
//! - [`signals`]: date/number/priority detection that blocks the create shortcut
//!
//! A create request with a plain title is answered entirely here (full
//! shortcut). Delete and toggle requests only get their intent tagged
//! (partial shortcut); a later stage works out which item is meant.

pub mod parser;
pub mod rules;
pub mod signals;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::model::{Action, Task};

pub use parser::{LexicalParser, ParseError, ParsedUtterance, UtteranceParser};
pub use rules::RuleKind;
pub use signals::ComplexitySignal;

/// The request classification that drives routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntentTag {
    CreateTask,
    DeleteTask,
    ToggleTask,
    DeleteTimeBlock,
    AgentFallback,
}

impl IntentTag {
    /// Intents resolved by picking one existing item out of a candidate set.
    pub fn is_focused(self) -> bool {
        matches!(
            self,
            Self::DeleteTask | Self::ToggleTask | Self::DeleteTimeBlock
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreateTask => "CREATE_TASK",
            Self::DeleteTask => "DELETE_TASK",
            Self::ToggleTask => "TOGGLE_TASK",
            Self::DeleteTimeBlock => "DELETE_TIME_BLOCK",
            Self::AgentFallback => "AGENT_FALLBACK",
        }
    }
}

impl std::fmt::Display for IntentTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of routing one utterance.
#[derive(Debug, Clone, PartialEq)]
pub struct RouterOutcome {
    pub intent: IntentTag,
    /// Ready-to-apply actions (full shortcut only).
    pub actions: Vec<Action>,
    /// Ready-to-send reply (full shortcut only).
    pub reply: Option<String>,
}

impl RouterOutcome {
    pub fn fallback() -> Self {
        Self::partial(IntentTag::AgentFallback)
    }

    pub fn partial(intent: IntentTag) -> Self {
        Self {
            intent,
            actions: Vec::new(),
            reply: None,
        }
    }

    fn created(task: Task) -> Self {
        let reply = format!("OK, I've added '{}' to your list.", task.title);
        Self {
            intent: IntentTag::CreateTask,
            actions: vec![Action::CreateTask { task }],
            reply: Some(reply),
        }
    }
}

/// Rule-based router over an injected utterance parser.
#[derive(Clone)]
pub struct PatternRouter {
    parser: Option<Arc<dyn UtteranceParser>>,
}

impl std::fmt::Debug for PatternRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatternRouter")
            .field("parser", &self.parser.as_ref().map(|p| p.name().to_owned()))
            .finish()
    }
}

impl Default for PatternRouter {
    fn default() -> Self {
        Self::lexical()
    }
}

impl PatternRouter {
    pub fn new(parser: Arc<dyn UtteranceParser>) -> Self {
        Self {
            parser: Some(parser),
        }
    }

    /// Router backed by the built-in [`LexicalParser`].
    pub fn lexical() -> Self {
        Self::new(Arc::new(LexicalParser::new()))
    }

    /// Router with no parser: every utterance falls back to the agent.
    pub fn disabled() -> Self {
        Self { parser: None }
    }

    /// Classify one utterance.
    pub fn route(&self, utterance: &str) -> RouterOutcome {
        let Some(parser) = &self.parser else {
            return RouterOutcome::fallback();
        };
        let parsed = match parser.parse(utterance) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(parser = parser.name(), error = %e, "utterance parser failed, falling back");
                return RouterOutcome::fallback();
            }
        };

        let Some(best) = rules::best_match(&parsed) else {
            return RouterOutcome::fallback();
        };
        debug!(rule = ?best.kind, span = best.len(), "router rule matched");

        match best.kind {
            RuleKind::Create => {
                if let Some(signal) = signals::detect(&parsed) {
                    debug!(?signal, "create shortcut declined");
                    return RouterOutcome::fallback();
                }
                let title = best
                    .title_start
                    .map(|i| clean_title(parsed.text_from_token(i)))
                    .unwrap_or_default();
                if title.is_empty() {
                    return RouterOutcome::fallback();
                }
                RouterOutcome::created(Task::new(title))
            }
            RuleKind::Delete if best.mentions_time_block(&parsed) => {
                RouterOutcome::partial(IntentTag::DeleteTimeBlock)
            }
            RuleKind::Delete => RouterOutcome::partial(IntentTag::DeleteTask),
            RuleKind::Toggle => RouterOutcome::partial(IntentTag::ToggleTask),
        }
    }
}

fn clean_title(raw: &str) -> String {
    raw.trim_matches(|c: char| c.is_whitespace() || (c.is_ascii_punctuation() && c != ')'))
        .to_owned()
}
