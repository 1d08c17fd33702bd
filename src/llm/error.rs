//! Error types for the model-service capabilities.
//!
//! Each error variant carries a stable error code (SCREAMING_SNAKE_CASE)
//! that is included in the Display output and accessible via [`LlmError::code()`].
//! Both the reasoning engine and the embedding engine report failures with
//! this type.

/// Stable error codes for programmatic error handling.
pub mod error_codes {
    /// Invalid or missing configuration.
    pub const CONFIG_INVALID: &str = "CONFIG_INVALID";

    /// Authentication failed (invalid/missing API key).
    pub const AUTH_FAILED: &str = "AUTH_FAILED";

    /// Request to the model service failed.
    pub const REQUEST_FAILED: &str = "REQUEST_FAILED";

    /// Request timed out.
    pub const TIMEOUT_ERROR: &str = "TIMEOUT_ERROR";

    /// Provider-specific error not covered by other variants.
    pub const PROVIDER_ERROR: &str = "PROVIDER_ERROR";

    /// The service answered, but the response envelope was unusable.
    pub const RESPONSE_INVALID: &str = "RESPONSE_INVALID";
}

/// Errors produced by model-service capabilities.
///
/// The Display impl formats as `[CODE] message`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LlmError {
    /// Invalid or missing configuration.
    #[error("[{}] {}", error_codes::CONFIG_INVALID, .0)]
    ConfigError(String),

    /// Authentication failed (invalid/missing API key).
    #[error("[{}] {}", error_codes::AUTH_FAILED, .0)]
    AuthError(String),

    /// Request to the model service failed.
    #[error("[{}] {}", error_codes::REQUEST_FAILED, .0)]
    RequestError(String),

    /// Request timed out.
    #[error("[{}] {}", error_codes::TIMEOUT_ERROR, .0)]
    TimeoutError(String),

    /// Provider-specific error not covered by other variants.
    #[error("[{}] {}", error_codes::PROVIDER_ERROR, .0)]
    ProviderError(String),

    /// The response envelope (not the model's own text) could not be read.
    #[error("[{}] {}", error_codes::RESPONSE_INVALID, .0)]
    ResponseError(String),
}

impl LlmError {
    /// Returns the stable error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError(_) => error_codes::CONFIG_INVALID,
            Self::AuthError(_) => error_codes::AUTH_FAILED,
            Self::RequestError(_) => error_codes::REQUEST_FAILED,
            Self::TimeoutError(_) => error_codes::TIMEOUT_ERROR,
            Self::ProviderError(_) => error_codes::PROVIDER_ERROR,
            Self::ResponseError(_) => error_codes::RESPONSE_INVALID,
        }
    }

    /// Returns the inner message without the code prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::ConfigError(m)
            | Self::AuthError(m)
            | Self::RequestError(m)
            | Self::TimeoutError(m)
            | Self::ProviderError(m)
            | Self::ResponseError(m) => m,
        }
    }

    /// Returns true if this error represents a transient failure that can be retried.
    ///
    /// Network failures, timeouts, rate limits and 5xx responses are
    /// retryable; configuration, authentication and unusable responses are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConfigError(_) | Self::AuthError(_) | Self::ResponseError(_) => false,
            Self::RequestError(_) | Self::TimeoutError(_) | Self::ProviderError(_) => true,
        }
    }

    /// Map a `reqwest` transport error, distinguishing timeouts.
    pub(crate) fn from_transport(service: &str, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::TimeoutError(format!("{service} request timed out: {err}"))
        } else {
            Self::RequestError(format!("{service} request failed: {err}"))
        }
    }
}

/// Convenience alias for model-service results.
pub type Result<T> = std::result::Result<T, LlmError>;
