//! Reasoning-engine capability and its OpenAI adapter.
//!
//! # Submodules
//!
//! - [`error`]: Error types with stable error codes (shared with embeddings)
//! - [`message`]: Conversation messages
//! - [`types`]: Request options
//! - [`engine`]: The [`ReasoningEngine`] trait
//! - [`openai`]: OpenAI-compatible chat completions adapter

pub mod engine;
pub mod error;
pub mod message;
pub mod openai;
pub mod types;

pub use engine::ReasoningEngine;
pub use error::LlmError;
pub use message::{Message, Role};
pub use openai::{OpenAiChatEngine, OpenAiConfig};
pub use types::{OutputFormat, RequestOptions};
