//! Embedding provider trait for generating vector embeddings from text.

use async_trait::async_trait;

use crate::error::{DocQaError, Result};

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap specific embedding backends (sentence-transformer
/// endpoints, OpenAI, local models) behind a unified async interface. The
/// default [`embed_batch`](EmbeddingProvider::embed_batch) implementation calls
/// [`embed`](EmbeddingProvider::embed) sequentially; backends that support
/// native batching should override it.
///
/// Providers must fail with [`DocQaError::Embedding`] on malformed input
/// instead of returning a zero or garbage vector.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::EmbeddingProvider;
///
/// let provider = MyEmbeddingProvider::new();
/// let embedding = provider.embed("hello world").await?;
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs.
    ///
    /// The default implementation calls [`embed`](EmbeddingProvider::embed)
    /// sequentially for each input and stops at the first failure.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// The model identifier, used in logs and error reports.
    fn model_name(&self) -> &str;
}

/// Reject vectors no similarity can be computed against.
///
/// # Errors
///
/// Returns [`DocQaError::Embedding`] if `embedding` is empty, contains a
/// non-finite value, or is all zeros.
pub fn validate_embedding(provider: &str, embedding: &[f32]) -> Result<()> {
    let reject = |message: &str| {
        Err(DocQaError::Embedding { provider: provider.to_string(), message: message.to_string() })
    };

    if embedding.is_empty() {
        return reject("provider returned an empty vector");
    }
    if embedding.iter().any(|v| !v.is_finite()) {
        return reject("provider returned a non-finite value");
    }
    if embedding.iter().all(|v| *v == 0.0) {
        return reject("provider returned a zero vector");
    }
    Ok(())
}
