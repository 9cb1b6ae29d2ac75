//! Vector store trait for storing chunk embeddings.

use async_trait::async_trait;

use crate::document::{ChunkId, StoredChunk};
use crate::error::Result;

/// A session-scoped storage backend for chunk embeddings.
///
/// Each entry keeps the embedding, text, and metadata of one chunk together,
/// so a chunk is either fully present or absent. Ranking is done by the
/// [`Retriever`](crate::Retriever); stores only need a stable iteration order
/// between two calls to [`clear`](VectorStore::clear).
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.put(chunk).await?;
/// let entries = store.get_all().await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert a chunk, overwriting any entry with the same id.
    async fn put(&self, chunk: StoredChunk) -> Result<()>;

    /// Fetch a single chunk by id.
    async fn get(&self, id: &ChunkId) -> Result<Option<StoredChunk>>;

    /// Return every stored chunk.
    async fn get_all(&self) -> Result<Vec<StoredChunk>>;

    /// Number of stored chunks.
    async fn len(&self) -> Result<usize>;

    /// Returns `true` if nothing is stored.
    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Remove every entry at once.
    async fn clear(&self) -> Result<()>;
}
