//! Orchestrator: the per-request routing state machine.
//!
//! # Submodules
//!
//! - [`stage`]: stage enum and transition table
//! - [`context`]: injected capability handles and tunables
//! - [`orchestrator`]: the run loop and turn state

pub mod context;
pub mod orchestrator;
pub mod stage;

pub use context::{PipelineContext, PipelineSettings};
pub use orchestrator::{Orchestrator, TurnOutcome, TurnState};
pub use stage::{Stage, TRANSITIONS, Transition, When, next_stage, route_for};
