//! In-memory vector store.
//!
//! This module provides [`InMemoryVectorStore`], a vector store backed by an
//! insertion-ordered `IndexMap` protected by a `tokio::sync::RwLock`. It holds
//! the chunks of a single session and is dropped with it.

use async_trait::async_trait;
use indexmap::IndexMap;
use tokio::sync::RwLock;

use crate::document::{ChunkId, StoredChunk};
use crate::error::Result;
use crate::vectorstore::VectorStore;

/// An in-memory vector store keyed by [`ChunkId`].
///
/// Iteration follows first-insertion order; overwriting an id keeps its
/// original position. [`clear`](VectorStore::clear) swaps the whole map under
/// the write lock, so readers see either the old contents or nothing.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// assert!(store.is_empty().await?);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    entries: RwLock<IndexMap<ChunkId, StoredChunk>>,
}

impl InMemoryVectorStore {
    /// Create a new empty in-memory vector store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn put(&self, chunk: StoredChunk) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.insert(chunk.id.clone(), chunk);
        Ok(())
    }

    async fn get(&self, id: &ChunkId) -> Result<Option<StoredChunk>> {
        let entries = self.entries.read().await;
        Ok(entries.get(id).cloned())
    }

    async fn get_all(&self) -> Result<Vec<StoredChunk>> {
        let entries = self.entries.read().await;
        Ok(entries.values().cloned().collect())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.entries.read().await.len())
    }

    async fn clear(&self) -> Result<()> {
        let mut entries = self.entries.write().await;
        *entries = IndexMap::new();
        Ok(())
    }
}
