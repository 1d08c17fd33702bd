//! Similarity retriever: ranks existing tasks and time blocks against the
//! utterance by embedding cosine similarity.

use std::sync::Arc;

use tracing::debug;

use crate::embedding::{Embedder, cosine_similarity};
use crate::llm::LlmError;
use crate::model::{Task, TimeBlock};

/// Default number of task candidates.
pub const DEFAULT_TASK_TOP_K: usize = 5;
/// Default number of time-block candidates.
pub const DEFAULT_TIME_BLOCK_TOP_K: usize = 3;

/// Words that mark an utterance as creating something new.
const CREATION_WORDS: &[&str] = &["add", "create"];

/// True when the utterance uses creation vocabulary as a whole word.
///
/// Task retrieval is skipped for these: the request names a new entity,
/// so existing tasks would only add noise to the prompt.
pub fn mentions_creation(utterance: &str) -> bool {
    utterance
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| CREATION_WORDS.iter().any(|w| word.eq_ignore_ascii_case(w)))
}

/// The text embedded for a time block: `"<task title> at <start time>"`.
pub fn describe_time_block(block: &TimeBlock, tasks: &[Task]) -> String {
    let title = tasks
        .iter()
        .find(|t| t.id == block.task_id)
        .map_or("an unknown task", |t| t.title.as_str());
    format!("{title} at {}", block.start_time.format("%Y-%m-%d %H:%M"))
}

/// Embedding-backed candidate ranking.
#[derive(Clone)]
pub struct SimilarityRetriever {
    embedder: Arc<dyn Embedder>,
}

impl std::fmt::Debug for SimilarityRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimilarityRetriever")
            .field("embedder", &self.embedder.name())
            .finish()
    }
}

impl SimilarityRetriever {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }

    /// Rank `items` by similarity of their description to `query`.
    ///
    /// Returns at most `top_k` indices into `descriptions`, most similar
    /// first. Equal scores keep input order and NaN scores rank last. An
    /// empty collection (or a zero
    /// `top_k`) returns immediately without calling the embedder.
    ///
    /// # Errors
    ///
    /// Propagates embedder failures, and returns
    /// [`LlmError::ResponseError`] when the embedder returns the wrong
    /// number of vectors.
    pub async fn rank(
        &self,
        query: &str,
        descriptions: &[String],
        top_k: usize,
    ) -> Result<Vec<usize>, LlmError> {
        if descriptions.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let query_vec = self.embedder.embed_query(query).await?;
        let item_vecs = self.embedder.embed_documents(descriptions).await?;
        if item_vecs.len() != descriptions.len() {
            return Err(LlmError::ResponseError(format!(
                "embedder returned {} vectors for {} items",
                item_vecs.len(),
                descriptions.len()
            )));
        }

        let mut scored: Vec<(usize, f32)> = item_vecs
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let score = cosine_similarity(&query_vec, v);
                (i, if score.is_nan() { f32::NEG_INFINITY } else { score })
            })
            .collect();
        // stable sort: ties stay in input order
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(top_k);

        debug!(
            items = descriptions.len(),
            top_k,
            best = scored.first().map(|(_, s)| *s),
            "ranked candidates"
        );
        Ok(scored.into_iter().map(|(i, _)| i).collect())
    }

    /// The `top_k` tasks most similar to the query.
    pub async fn similar_tasks(
        &self,
        query: &str,
        tasks: &[Task],
        top_k: usize,
    ) -> Result<Vec<Task>, LlmError> {
        let titles: Vec<String> = tasks.iter().map(|t| t.title.clone()).collect();
        let ranked = self.rank(query, &titles, top_k).await?;
        Ok(ranked.into_iter().map(|i| tasks[i].clone()).collect())
    }

    /// Task candidates for an utterance, skipping retrieval for create requests.
    pub async fn task_candidates(
        &self,
        utterance: &str,
        tasks: &[Task],
        top_k: usize,
    ) -> Result<Vec<Task>, LlmError> {
        if mentions_creation(utterance) {
            debug!("creation vocabulary present, skipping task retrieval");
            return Ok(Vec::new());
        }
        self.similar_tasks(utterance, tasks, top_k).await
    }

    /// The `top_k` time blocks most similar to the query.
    pub async fn similar_time_blocks(
        &self,
        query: &str,
        blocks: &[TimeBlock],
        tasks: &[Task],
        top_k: usize,
    ) -> Result<Vec<TimeBlock>, LlmError> {
        let descriptions: Vec<String> = blocks
            .iter()
            .map(|b| describe_time_block(b, tasks))
            .collect();
        let ranked = self.rank(query, &descriptions, top_k).await?;
        Ok(ranked.into_iter().map(|i| blocks[i].clone()).collect())
    }
}
