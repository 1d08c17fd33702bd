//! Generation options shared by reasoning-engine adapters.

use serde::{Deserialize, Serialize};

/// The shape of output requested from the reasoning engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Free-form text.
    #[default]
    Text,
    /// A single JSON object (provider JSON mode where available).
    JsonObject,
}

/// Options controlling generation behavior.
///
/// # Examples
///
/// ```
/// use taskwise::llm::types::{OutputFormat, RequestOptions};
///
/// let opts = RequestOptions::new()
///     .with_max_tokens(512)
///     .with_temperature(0.0)
///     .with_output_format(OutputFormat::JsonObject);
///
/// assert_eq!(opts.max_tokens, Some(512));
/// assert_eq!(opts.output_format, OutputFormat::JsonObject);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestOptions {
    /// Maximum tokens to generate. `None` means use provider default.
    pub max_tokens: Option<usize>,
    /// Sampling temperature (0.0 = deterministic, 2.0 = max randomness).
    pub temperature: Option<f64>,
    /// Requested output format.
    pub output_format: OutputFormat,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            max_tokens: None,
            temperature: Some(0.0),
            output_format: OutputFormat::Text,
        }
    }
}

impl RequestOptions {
    /// Create request options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of tokens to generate.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the sampling temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the output format.
    #[must_use]
    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    /// Shorthand for requesting a JSON object.
    #[must_use]
    pub fn json(self) -> Self {
        self.with_output_format(OutputFormat::JsonObject)
    }
}
