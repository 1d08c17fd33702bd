//! Taskwise: a stateless conversational assistant for a task list.
//!
//! Every chat turn carries the client's full state (tasks, time blocks,
//! transcript). The server replies with a message plus an ordered list of
//! actions the client applies locally.
//!
//! # Architecture
//!
//! A turn runs through a small state machine ([`pipeline`]):
//! - **Pattern router** ([`intent`]): handles unambiguous commands with no
//!   model call, or tags the turn for a cheaper path
//! - **Similarity retriever** ([`retrieval`]): ranks tasks and time blocks
//!   against the utterance by embedding similarity
//! - **Focused resolver** ([`resolver`]): picks one candidate for a
//!   delete/toggle with a narrow model call
//! - **General agent** ([`agent`]): everything else, against the full state
//!   rendered by [`prompt`]
//! - **Action normalizer** ([`normalizer`]): validates model-emitted actions
//!   before they leave the server

pub mod agent;
pub mod config;
pub mod embedding;
pub mod error;
pub mod intent;
pub mod llm;
pub mod model;
pub mod normalizer;
pub mod observability;
pub mod pipeline;
pub mod prompt;
pub mod resolver;
pub mod retrieval;
pub mod server;

pub use config::AssistantConfig;
pub use error::{AssistantError, Result};
pub use intent::{IntentTag, PatternRouter};
pub use model::{Action, ChatMessage, ChatRequest, ChatResponse, Priority, Sender, Task, TimeBlock};
pub use pipeline::{Orchestrator, PipelineContext, PipelineSettings};
