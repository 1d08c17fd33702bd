//! Error types for the taskwise pipeline.

use crate::llm::LlmError;

/// Top-level error type for a chat turn.
///
/// Malformed model output is not represented here: it is recovered inside
/// the stage that produced it and turned into a degraded reply.
#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    /// The reasoning or embedding service failed or was unreachable.
    #[error("upstream model service error: {0}")]
    Llm(#[from] LlmError),

    /// The request violates the boundary contract (e.g. empty history).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The domain state is too large to render into a single instruction.
    #[error("prompt too large: {entities} entities exceeds the limit of {limit}")]
    PromptTooLarge {
        /// Tasks plus time blocks in the request.
        entities: usize,
        /// Configured maximum.
        limit: usize,
    },

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, AssistantError>;
