//! Cosine-similarity retrieval over a [`VectorStore`].

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::document::{ChunkId, ScoredChunk};
use crate::error::Result;
use crate::vectorstore::VectorStore;

/// Score given to a chunk whose similarity could not be computed.
///
/// It sorts below every real cosine similarity, including `-1.0`.
pub const SENTINEL_SCORE: f32 = f32::NEG_INFINITY;

/// Why a cosine similarity could not be computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SimilarityError {
    /// The vectors have different lengths.
    #[error("dimension mismatch: {left} vs {right}")]
    DimensionMismatch {
        /// Length of the first vector.
        left: usize,
        /// Length of the second vector.
        right: usize,
    },
    /// At least one vector is empty.
    #[error("empty vector")]
    Empty,
    /// At least one vector has zero magnitude.
    #[error("zero-magnitude vector")]
    ZeroMagnitude,
    /// The computation produced NaN or infinity.
    #[error("non-finite similarity")]
    NonFinite,
}

/// Compute `dot(a, b) / (||a|| * ||b||)`.
///
/// # Errors
///
/// Returns a [`SimilarityError`] when the similarity is undefined.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> std::result::Result<f32, SimilarityError> {
    if a.len() != b.len() {
        return Err(SimilarityError::DimensionMismatch { left: a.len(), right: b.len() });
    }
    if a.is_empty() {
        return Err(SimilarityError::Empty);
    }

    // f64 accumulation keeps large but finite components from overflowing.
    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum();
    let norm_a = a.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return Err(SimilarityError::ZeroMagnitude);
    }

    let similarity = (dot / (norm_a * norm_b)) as f32;
    if !similarity.is_finite() {
        return Err(SimilarityError::NonFinite);
    }
    Ok(similarity)
}

/// The ranked outcome of a retrieval.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Retrieval {
    /// Chunks ordered by non-increasing score, at most `top_k` of them.
    pub chunks: Vec<ScoredChunk>,
    /// Every stored chunk whose similarity could not be computed, ranked or not.
    pub degraded: Vec<ChunkId>,
}

impl Retrieval {
    /// The ids of the retrieved chunks, in rank order.
    pub fn ids(&self) -> Vec<ChunkId> {
        self.chunks.iter().map(|c| c.id.clone()).collect()
    }

    /// Returns `true` if nothing was retrieved.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Ranks every chunk in a [`VectorStore`] against a query embedding.
///
/// Sorting is stable, so chunks with equal scores keep the store's iteration
/// order (insertion order for [`InMemoryVectorStore`](crate::InMemoryVectorStore)).
#[derive(Clone)]
pub struct Retriever {
    store: Arc<dyn VectorStore>,
}

impl Retriever {
    /// Create a retriever over `store`.
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self { store }
    }

    /// Return the `top_k` chunks most similar to `query`.
    ///
    /// A stored vector that cannot be compared (wrong dimension, zero
    /// magnitude) gets [`SENTINEL_SCORE`] instead of failing the retrieval.
    ///
    /// # Errors
    ///
    /// Only store failures are returned.
    pub async fn retrieve(&self, query: &[f32], top_k: usize) -> Result<Retrieval> {
        let entries = self.store.get_all().await?;
        let mut degraded = Vec::new();

        let mut scored: Vec<ScoredChunk> = entries
            .into_iter()
            .map(|entry| {
                let (score, failed) = match cosine_similarity(query, &entry.embedding) {
                    Ok(score) => (score, false),
                    Err(e) => {
                        warn!(chunk = %entry.id, error = %e, "similarity failed, using sentinel score");
                        degraded.push(entry.id.clone());
                        (SENTINEL_SCORE, true)
                    }
                };
                ScoredChunk {
                    id: entry.id,
                    text: entry.text,
                    metadata: entry.metadata,
                    score,
                    degraded: failed,
                }
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(top_k);

        debug!(retrieved = scored.len(), degraded = degraded.len(), top_k, "retrieval completed");

        Ok(Retrieval { chunks: scored, degraded })
    }
}

/// Join chunk texts in rank order, separated by a single space.
pub fn assemble_context(chunks: &[ScoredChunk]) -> String {
    chunks.iter().map(|c| c.text.as_str()).collect::<Vec<_>>().join(" ")
}
