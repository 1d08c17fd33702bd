//! Embedding-engine capability for semantic candidate retrieval.
//!
//! # Pipeline
//!
//! ```text
//! text → Embedder → f32 vector → cosine similarity against candidates
//! ```

pub mod openai;

use async_trait::async_trait;

use crate::llm::LlmError;

pub use openai::{OpenAiEmbedder, OpenAiEmbeddingConfig};

/// Maps text to fixed-dimension vectors.
///
/// Implementations must return exactly one vector per input, in input order.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the embedder name (e.g. `"openai"`).
    fn name(&self) -> &str;

    /// Embed a batch of documents.
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError>;

    /// Embed a single query string.
    ///
    /// The default forwards to [`embed_documents`](Self::embed_documents).
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let mut vectors = self.embed_documents(&[text.to_owned()]).await?;
        vectors
            .pop()
            .ok_or_else(|| LlmError::ResponseError("embedder returned no vector".into()))
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns a value in `[-1.0, 1.0]`, or `0.0` when either vector is zero
/// or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denom = norm_a * norm_b;
    if denom < 1e-12 {
        return 0.0;
    }
    dot / denom
}
