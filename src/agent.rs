//! General agent: the full reasoning call for anything the cheaper stages
//! cannot settle.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, warn};

use crate::llm::{LlmError, Message, ReasoningEngine, RequestOptions};
use crate::model::{ChatRequest, ChatResponse};
use crate::normalizer::{NormalizationReport, normalize_actions, parse_json_object};

/// Reply used when the model's output cannot be decoded at all.
pub const DECODE_FAILURE_REPLY: &str =
    "I'm sorry, I encountered an error processing your request. Please try again.";

/// Reply used when the model decoded fine but left `response_message` out.
pub const MISSING_REPLY: &str = "I processed your request.";

/// What one agent call produced.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentOutcome {
    pub response: ChatResponse,
    /// `None` when the output did not decode and nothing was normalized.
    pub report: Option<NormalizationReport>,
}

/// Full-context reasoning over the whole conversation and task state.
#[derive(Clone)]
pub struct GeneralAgent {
    engine: Arc<dyn ReasoningEngine>,
    options: RequestOptions,
}

impl std::fmt::Debug for GeneralAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneralAgent")
            .field("engine", &self.engine.name())
            .field("options", &self.options)
            .finish()
    }
}

impl GeneralAgent {
    pub fn new(engine: Arc<dyn ReasoningEngine>) -> Self {
        Self {
            engine,
            options: RequestOptions::new().json(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options.json();
        self
    }

    /// Run the agent with a rendered system prompt and chat transcript.
    ///
    /// # Errors
    ///
    /// Returns the model error when the call itself fails. Undecodable
    /// output is not an error: it yields [`DECODE_FAILURE_REPLY`] with no
    /// actions.
    pub async fn run(
        &self,
        system_prompt: String,
        transcript: String,
        request: &ChatRequest,
        now: DateTime<Utc>,
    ) -> Result<AgentOutcome, LlmError> {
        let messages = [Message::system(system_prompt), Message::user(transcript)];
        let raw = self.engine.generate_json(&messages, &self.options).await?;

        let mut reply = match parse_json_object(&raw) {
            Ok(obj) => obj,
            Err(e) => {
                warn!(error = %e, "general agent output did not decode");
                return Ok(AgentOutcome {
                    response: ChatResponse::reply_only(DECODE_FAILURE_REPLY),
                    report: None,
                });
            }
        };

        let text = reply
            .get("response_message")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(MISSING_REPLY)
            .to_owned();
        let raw_actions = reply.remove("actions").unwrap_or(Value::Null);
        let (actions, report) = normalize_actions(&raw_actions, request, now);
        debug!(kept = report.kept, dropped = report.dropped.len(), "general agent actions normalized");

        Ok(AgentOutcome {
            response: ChatResponse::new(text, actions),
            report: Some(report),
        })
    }
}
