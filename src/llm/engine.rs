//! Reasoning-engine capability trait.
//!
//! The pipeline never talks to a concrete provider. Stages receive an
//! `Arc<dyn ReasoningEngine>` through [`PipelineContext`](crate::pipeline::PipelineContext),
//! so tests substitute scripted fakes.

use async_trait::async_trait;

use super::error::LlmError;
use super::message::Message;
use super::types::RequestOptions;

/// An instruction-following language model.
///
/// Implementations return the raw text the model produced. Decoding that
/// text is the caller's job, which keeps "the service failed" (an `Err`)
/// separate from "the service answered with garbage" (an `Ok` that fails
/// to decode).
#[async_trait]
pub trait ReasoningEngine: Send + Sync {
    /// Returns the engine name (e.g. `"openai"`).
    fn name(&self) -> &str;

    /// Generate free-form text for the conversation.
    async fn generate_text(
        &self,
        messages: &[Message],
        options: &RequestOptions,
    ) -> Result<String, LlmError>;

    /// Generate a JSON object following the instruction in `messages`.
    ///
    /// The default forwards to [`generate_text`](Self::generate_text) with
    /// JSON output requested.
    async fn generate_json(
        &self,
        messages: &[Message],
        options: &RequestOptions,
    ) -> Result<String, LlmError> {
        let options = options.clone().json();
        self.generate_text(messages, &options).await
    }
}
