//! Tracing span names and field keys.
//!
//! Spans follow the hierarchy:
//!
//! ```text
//! taskwise.pipeline.turn
//!   └─> taskwise.pipeline.stage
//! taskwise.http.request (wraps a turn when served over HTTP)
//! ```
//!
//! # Example
//!
//! ```rust
//! use tracing::info_span;
//! use taskwise::observability::*;
//!
//! let span = info_span!(SPAN_PIPELINE_TURN, { FIELD_REQUEST_ID } = "req-1");
//! let _enter = span.enter();
//! ```

// Span names (hierarchical, dot-separated)
/// Root span for one chat turn through the pipeline.
pub const SPAN_PIPELINE_TURN: &str = "taskwise.pipeline.turn";

/// Span for a single pipeline stage (child of the turn span).
pub const SPAN_PIPELINE_STAGE: &str = "taskwise.pipeline.stage";

/// Span for an HTTP request handled by the server.
pub const SPAN_HTTP_REQUEST: &str = "taskwise.http.request";

// Field keys for span attributes
/// Request identifier field (UUID).
pub const FIELD_REQUEST_ID: &str = "request_id";

/// Pipeline stage field (e.g. "intent_router", "focused_resolver").
pub const FIELD_STAGE: &str = "stage";

/// Intent tag field (e.g. "CREATE_TASK").
pub const FIELD_INTENT: &str = "intent";

/// Number of actions emitted.
pub const FIELD_ACTION_COUNT: &str = "action_count";

/// Number of candidates retrieved.
pub const FIELD_CANDIDATE_COUNT: &str = "candidate_count";

/// Stable error code field (see `llm::error::error_codes`).
pub const FIELD_ERROR_CODE: &str = "error_code";
