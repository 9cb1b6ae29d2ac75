//! Model catalogue, model loading, and the loaded-model cache.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::answer::AnswerEngine;
use crate::embedding::EmbeddingProvider;
use crate::error::Result;

/// The embedding model used when none is configured.
pub const DEFAULT_EMBEDDING_MODEL: &str = "all-mpnet-base-v2";

/// The question-answering model used when none is configured.
pub const DEFAULT_QA_MODEL: &str = "distilbert-base-cased-distilled-squad";

/// Sentence-transformer models offered for embedding.
pub const EMBEDDING_MODELS: &[&str] = &[
    "all-mpnet-base-v2",
    "multi-qa-mpnet-base-dot-v1",
    "msmarco-bert-base-dot-v5",
    "all-MiniLM-L6-v2",
    "sentence-t5-base",
    "quora-distilbert-multilingual",
    "multi-qa-MiniLM-L6-cos-v1",
    "paraphrase-albert-small-v2",
];

/// Question-answering models offered, as `(display name, model id)`.
pub const QA_MODELS: &[(&str, &str)] = &[
    ("DistilBERT (default)", "distilbert-base-cased-distilled-squad"),
    ("RoBERTa Base", "deepset/roberta-base-squad2"),
    ("ALBERT", "Palak/albert-base-v2_squad"),
    ("MiniLM", "deepset/minilm-uncased-squad2"),
    ("BERT Large", "bert-large-uncased-whole-word-masking-finetuned-squad"),
];

/// Map a display name from [`QA_MODELS`] to its model id.
///
/// Anything else is taken to be a model id already and returned unchanged.
pub fn resolve_qa_model(name: &str) -> &str {
    QA_MODELS
        .iter()
        .find(|(display, _)| display.eq_ignore_ascii_case(name))
        .map(|(_, id)| *id)
        .unwrap_or(name)
}

/// Loads models by identifier.
///
/// Loading is expected to be slow; callers go through a [`ModelCache`].
#[async_trait]
pub trait ModelLoader: Send + Sync {
    /// Load the embedding model `name`.
    async fn load_embedding_provider(&self, name: &str) -> Result<Arc<dyn EmbeddingProvider>>;

    /// Load the question-answering model `name`.
    async fn load_answer_engine(&self, name: &str) -> Result<Arc<dyn AnswerEngine>>;
}

/// A bounded cache of loaded models keyed by model name.
///
/// Eviction is least-recently-used: a hit moves the entry to the back, and
/// inserting into a full cache drops the front entry. Sessions holding an
/// evicted model keep their `Arc`, so eviction never invalidates a live
/// session. Failed loads are not cached.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::ModelCache;
///
/// let cache: ModelCache<dyn EmbeddingProvider> = ModelCache::new(4);
/// let model = cache.get_or_try_load("all-mpnet-base-v2", |name| loader.load_embedding_provider(name)).await?;
/// ```
pub struct ModelCache<M: ?Sized> {
    capacity: usize,
    entries: Mutex<IndexMap<String, Arc<M>>>,
}

impl<M: ?Sized> ModelCache<M> {
    /// Create a cache holding at most `capacity` models (at least one).
    pub fn new(capacity: usize) -> Self {
        Self { capacity: capacity.max(1), entries: Mutex::new(IndexMap::new()) }
    }

    /// The maximum number of cached models.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of cached models.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Returns `true` if no model is cached.
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Returns `true` if `name` is cached. Does not affect recency.
    pub async fn contains(&self, name: &str) -> bool {
        self.entries.lock().await.contains_key(name)
    }

    /// Return the cached model `name`, loading it with `load` on a miss.
    ///
    /// The cache lock is held while loading, so concurrent requests for the
    /// same model load it once. Loads of different models are serialized as
    /// well: only one model is ever being loaded at a time.
    ///
    /// # Errors
    ///
    /// Returns whatever `load` returns; nothing is cached in that case.
    pub async fn get_or_try_load<F, Fut>(&self, name: &str, load: F) -> Result<Arc<M>>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<Arc<M>>>,
    {
        let mut entries = self.entries.lock().await;

        if let Some(model) = entries.shift_remove(name) {
            debug!(model = name, "model cache hit");
            entries.insert(name.to_string(), Arc::clone(&model));
            return Ok(model);
        }

        let model = load(name.to_string()).await?;
        if entries.len() >= self.capacity {
            if let Some((evicted, _)) = entries.shift_remove_index(0) {
                info!(model = %evicted, "evicted least recently used model");
            }
        }
        entries.insert(name.to_string(), Arc::clone(&model));
        info!(model = name, cached = entries.len(), "loaded model");
        Ok(model)
    }

    /// Drop every cached model.
    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }
}

impl<M: ?Sized> std::fmt::Debug for ModelCache<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelCache").field("capacity", &self.capacity).finish_non_exhaustive()
    }
}
