//! Session orchestration: ingestion and question answering.
//!
//! A [`QaSession`] owns everything one user works with: its own vector store,
//! the loaded embedding provider and answer engine, and the settings. The
//! [`SessionManager`] hands out isolated sessions and shares loaded models
//! between them through [`ModelCache`]s.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use docqa_rag::{QaConfig, QaSession, SourceFile};
//!
//! let session = QaSession::builder()
//!     .config(QaConfig::default())
//!     .embedding_provider(Arc::new(my_embedder))
//!     .answer_engine(Arc::new(my_engine))
//!     .build()?;
//!
//! let report = session.ingest_files(&[SourceFile::read("report.txt")?]).await;
//! let outcome = session.ask("What was the revenue in 2023?").await?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::answer::{Answer, AnswerEngine, AnswerRequest};
use crate::chunking::TextSplitter;
use crate::config::QaConfig;
use crate::document::{ChunkId, ChunkMetadata, Document, ScoredChunk, StoredChunk};
use crate::embedding::{EmbeddingProvider, validate_embedding};
use crate::error::{DocQaError, MissingPrecondition, Result};
use crate::highlight::{Highlight, HighlightMarkers, highlight};
use crate::inmemory::InMemoryVectorStore;
use crate::models::{ModelCache, ModelLoader, resolve_qa_model};
use crate::retrieval::{Retriever, assemble_context};
use crate::source::{ExtractorSet, SourceFile, TextExtractor};
use crate::vectorstore::VectorStore;

/// Identifies a session within a [`SessionManager`].
pub type SessionId = String;

/// Guidance shown instead of an answer whose confidence is below the threshold.
pub const LOW_CONFIDENCE_NOTICE: &str =
    "The model's confidence is low. Consider rephrasing your question or checking the document.";

/// A chunk that was not stored because its embedding failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedChunk {
    /// The chunk's sequence index within its document.
    pub index: usize,
    /// Why the embedding failed.
    pub reason: String,
}

/// The result of ingesting one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentReport {
    /// The document name.
    pub name: String,
    /// Number of chunks stored.
    pub stored: usize,
    /// Chunks dropped after an embedding failure.
    pub dropped: Vec<DroppedChunk>,
}

/// A document that could not be ingested at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestFailure {
    /// The document name.
    pub name: String,
    /// Why ingestion failed.
    pub reason: String,
}

/// The result of ingesting a batch of documents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Documents that produced chunks (possibly with some dropped).
    pub documents: Vec<DocumentReport>,
    /// Documents that were skipped.
    pub failures: Vec<IngestFailure>,
}

impl IngestReport {
    /// Total chunks stored across the batch.
    pub fn stored_chunks(&self) -> usize {
        self.documents.iter().map(|d| d.stored).sum()
    }

    /// Total chunks dropped across the batch.
    pub fn dropped_chunks(&self) -> usize {
        self.documents.iter().map(|d| d.dropped.len()).sum()
    }

    fn record(&mut self, name: &str, result: Result<DocumentReport>) {
        match result {
            Ok(report) => self.documents.push(report),
            Err(e) => {
                error!(document = name, error = %e, "document ingestion failed");
                self.failures.push(IngestFailure { name: name.to_string(), reason: e.to_string() });
            }
        }
    }
}

/// An answer that passed the confidence threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct AnsweredQuery {
    /// The answer and its confidence.
    pub answer: Answer,
    /// The answer marked inside its context, when it could be located.
    pub highlight: Option<Highlight>,
    /// The context passed to the answer engine.
    pub context: String,
    /// The retrieved chunks, in rank order.
    pub sources: Vec<ScoredChunk>,
    /// Stored chunks whose similarity could not be computed.
    pub degraded: Vec<ChunkId>,
}

/// The outcome of [`QaSession::ask`].
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// The answer is confident enough to show.
    Answered(AnsweredQuery),
    /// The answer was withheld.
    LowConfidence {
        /// The engine's confidence.
        score: f32,
        /// The configured threshold.
        threshold: f32,
        /// Guidance for the user.
        notice: String,
        /// The retrieved chunk ids, in rank order.
        sources: Vec<ChunkId>,
    },
}

impl QueryOutcome {
    /// The answer, if it was confident enough to show.
    pub fn answer(&self) -> Option<&Answer> {
        match self {
            Self::Answered(answered) => Some(&answered.answer),
            Self::LowConfidence { .. } => None,
        }
    }

    /// Returns `true` if the answer was withheld.
    pub fn is_low_confidence(&self) -> bool {
        matches!(self, Self::LowConfidence { .. })
    }
}

/// A single user's document QA session.
///
/// Operations are meant to run one at a time; the store is still safe to
/// share, but interleaved ingestion and queries see partial batches.
pub struct QaSession {
    id: SessionId,
    config: QaConfig,
    store: Arc<dyn VectorStore>,
    retriever: Retriever,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    answer_engine: Option<Arc<dyn AnswerEngine>>,
    extractor: Arc<dyn TextExtractor>,
    splitter: Option<Arc<dyn TextSplitter>>,
    markers: HighlightMarkers,
    last_question: RwLock<Option<String>>,
}

impl std::fmt::Debug for QaSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QaSession")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("embedding_model", &self.embedding_provider.model_name())
            .field("answer_engine", &self.answer_engine.as_ref().map(|e| e.model_name().to_string()))
            .finish_non_exhaustive()
    }
}

impl QaSession {
    /// Create a new [`QaSessionBuilder`].
    pub fn builder() -> QaSessionBuilder {
        QaSessionBuilder::default()
    }

    /// The session id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The session settings.
    pub fn config(&self) -> &QaConfig {
        &self.config
    }

    /// The session's vector store.
    pub fn vector_store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Returns `true` if an answer engine is loaded.
    pub fn has_answer_engine(&self) -> bool {
        self.answer_engine.is_some()
    }

    /// Number of stored chunks.
    pub async fn chunk_count(&self) -> Result<usize> {
        self.store.len().await
    }

    /// The last question passed to [`ask`](Self::ask), until the session is cleared.
    pub async fn last_question(&self) -> Option<String> {
        self.last_question.read().await.clone()
    }

    /// Extract, chunk, embed and store each file.
    ///
    /// A file whose text cannot be extracted is reported in
    /// [`IngestReport::failures`] and the rest of the batch continues.
    pub async fn ingest_files(&self, files: &[SourceFile]) -> IngestReport {
        let mut report = IngestReport::default();
        for file in files {
            let result = match self.extractor.extract(file) {
                Ok(document) => self.ingest_document(&document).await,
                Err(e) => Err(e),
            };
            report.record(&file.name, result);
        }
        report
    }

    /// Chunk, embed and store each already-extracted document.
    pub async fn ingest_documents(&self, documents: &[Document]) -> IngestReport {
        let mut report = IngestReport::default();
        for document in documents {
            let result = self.ingest_document(document).await;
            report.record(&document.name, result);
        }
        report
    }

    /// Chunk, embed and store one document.
    ///
    /// A chunk whose embedding fails is dropped and listed in the report;
    /// the remaining chunks are still stored.
    ///
    /// # Errors
    ///
    /// - [`DocQaError::Ingestion`] if the document has no text
    /// - [`DocQaError::Chunking`] if the chunking parameters are invalid
    /// - store errors, which stop the document part-way
    pub async fn ingest_document(&self, document: &Document) -> Result<DocumentReport> {
        if document.text.trim().is_empty() {
            return Err(DocQaError::Ingestion {
                document: document.name.clone(),
                message: format!("no text could be extracted from {}", document.name),
            });
        }

        let strategy = self.config.strategy();
        let spans = match &self.splitter {
            Some(splitter) => strategy.chunk_with(&document.text, splitter.as_ref())?,
            None => strategy.chunk(&document.text)?,
        };

        let provider = self.embedding_provider.model_name();
        let mut stored = 0;
        let mut dropped = Vec::new();

        for (index, span) in spans.into_iter().enumerate() {
            let embedding = match self.embedding_provider.embed(&span.text).await.and_then(|e| {
                validate_embedding(provider, &e)?;
                Ok(e)
            }) {
                Ok(embedding) => embedding,
                Err(e) => {
                    warn!(document = %document.name, chunk_index = index, error = %e, "skipping chunk after embedding failure");
                    dropped.push(DroppedChunk { index, reason: e.to_string() });
                    continue;
                }
            };

            self.store
                .put(StoredChunk {
                    id: ChunkId::new(document.name.clone(), index),
                    embedding,
                    text: span.text,
                    metadata: ChunkMetadata {
                        document: document.name.clone(),
                        start: span.start,
                        end: span.end,
                    },
                })
                .await?;
            stored += 1;
        }

        info!(
            document = %document.name,
            strategy = %strategy.kind(),
            stored,
            dropped = dropped.len(),
            "ingested document"
        );

        Ok(DocumentReport { name: document.name.clone(), stored, dropped })
    }

    /// Answer `question` from the stored chunks.
    ///
    /// Embeds the question, retrieves the `top_k` most similar chunks, joins
    /// them into a context, and asks the answer engine. Answers below
    /// `min_score_threshold` come back as [`QueryOutcome::LowConfidence`].
    ///
    /// # Errors
    ///
    /// - [`DocQaError::Precondition`] when nothing is stored, the question is
    ///   blank, or no answer engine is loaded (checked in that order)
    /// - [`DocQaError::Embedding`] if the question cannot be embedded
    /// - [`DocQaError::AnswerEngine`] if the engine fails
    pub async fn ask(&self, question: &str) -> Result<QueryOutcome> {
        if self.store.is_empty().await? {
            return Err(DocQaError::Precondition(MissingPrecondition::NoStoredChunks));
        }
        let question = question.trim();
        if question.is_empty() {
            return Err(DocQaError::Precondition(MissingPrecondition::EmptyQuestion));
        }
        let Some(engine) = &self.answer_engine else {
            return Err(DocQaError::Precondition(MissingPrecondition::EngineUnavailable));
        };

        *self.last_question.write().await = Some(question.to_string());

        let provider = self.embedding_provider.model_name();
        let query_embedding = self.embedding_provider.embed(question).await.and_then(|e| {
            validate_embedding(provider, &e)?;
            Ok(e)
        });
        let query_embedding = query_embedding.map_err(|e| {
            error!(error = %e, "query embedding failed");
            match e {
                DocQaError::Embedding { .. } => e,
                other => DocQaError::Embedding {
                    provider: provider.to_string(),
                    message: other.to_string(),
                },
            }
        })?;

        let retrieval = self.retriever.retrieve(&query_embedding, self.config.top_k).await?;
        let context = assemble_context(&retrieval.chunks);

        let request = AnswerRequest {
            question: question.to_string(),
            context,
            max_answer_length: self.config.max_answer_length,
        };
        let answer = engine.answer(&request).await.map_err(|e| {
            error!(engine = engine.model_name(), error = %e, "answer engine failed");
            match e {
                DocQaError::AnswerEngine { .. } => e,
                other => DocQaError::AnswerEngine {
                    engine: engine.model_name().to_string(),
                    message: other.to_string(),
                },
            }
        })?;

        let threshold = self.config.min_score_threshold;
        if answer.score < threshold {
            info!(score = answer.score, threshold, "answer withheld for low confidence");
            return Ok(QueryOutcome::LowConfidence {
                score: answer.score,
                threshold,
                notice: LOW_CONFIDENCE_NOTICE.to_string(),
                sources: retrieval.ids(),
            });
        }

        let highlight =
            highlight(&request.context, &answer.text, self.config.context_window, &self.markers);
        if highlight.is_none() {
            info!("answer not found verbatim in context, no snippet");
        }

        info!(
            score = answer.score,
            sources = retrieval.chunks.len(),
            highlighted = highlight.is_some(),
            "question answered"
        );

        Ok(QueryOutcome::Answered(AnsweredQuery {
            answer,
            highlight,
            context: request.context,
            sources: retrieval.chunks,
            degraded: retrieval.degraded,
        }))
    }

    /// Discard every stored chunk and the last question.
    pub async fn clear(&self) -> Result<()> {
        self.store.clear().await?;
        *self.last_question.write().await = None;
        info!(session = %self.id, "session cleared");
        Ok(())
    }
}

/// Builder for constructing a [`QaSession`].
///
/// Only the embedding provider is required. Without an answer engine,
/// [`QaSession::ask`] fails with
/// [`MissingPrecondition::EngineUnavailable`].
#[derive(Default)]
pub struct QaSessionBuilder {
    id: Option<SessionId>,
    config: Option<QaConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    answer_engine: Option<Arc<dyn AnswerEngine>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    extractor: Option<Arc<dyn TextExtractor>>,
    splitter: Option<Arc<dyn TextSplitter>>,
    markers: Option<HighlightMarkers>,
}

impl QaSessionBuilder {
    /// Set the session id. A random UUID is used otherwise.
    pub fn id(mut self, id: impl Into<SessionId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the session settings. Defaults to [`QaConfig::default`].
    pub fn config(mut self, config: QaConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the answer engine.
    pub fn answer_engine(mut self, engine: Arc<dyn AnswerEngine>) -> Self {
        self.answer_engine = Some(engine);
        self
    }

    /// Set the answer engine if one is available.
    pub fn maybe_answer_engine(mut self, engine: Option<Arc<dyn AnswerEngine>>) -> Self {
        self.answer_engine = engine;
        self
    }

    /// Set the vector store. Defaults to a fresh [`InMemoryVectorStore`].
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Set the text extractor. Defaults to [`ExtractorSet::new`].
    pub fn text_extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Set the splitter used by semantic chunking.
    pub fn text_splitter(mut self, splitter: Arc<dyn TextSplitter>) -> Self {
        self.splitter = Some(splitter);
        self
    }

    /// Set the highlight markers. Defaults to `<mark>`/`</mark>`.
    pub fn highlight_markers(mut self, markers: HighlightMarkers) -> Self {
        self.markers = Some(markers);
        self
    }

    /// Build the [`QaSession`].
    ///
    /// # Errors
    ///
    /// Returns [`DocQaError::Config`] if the embedding provider is missing or
    /// the settings are invalid.
    pub fn build(self) -> Result<QaSession> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| DocQaError::Config("embedding_provider is required".to_string()))?;
        let store = self.vector_store.unwrap_or_else(|| Arc::new(InMemoryVectorStore::new()));

        Ok(QaSession {
            id: self.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            config,
            retriever: Retriever::new(Arc::clone(&store)),
            store,
            embedding_provider,
            answer_engine: self.answer_engine,
            extractor: self.extractor.unwrap_or_else(|| Arc::new(ExtractorSet::new())),
            splitter: self.splitter,
            markers: self.markers.unwrap_or_default(),
            last_question: RwLock::new(None),
        })
    }
}

/// Hands out isolated sessions that share loaded models.
///
/// Every session gets its own vector store; embedding providers and answer
/// engines are loaded once per model name and reused across sessions.
#[derive(Clone)]
pub struct SessionManager {
    loader: Arc<dyn ModelLoader>,
    embedding_models: Arc<ModelCache<dyn EmbeddingProvider>>,
    answer_engines: Arc<ModelCache<dyn AnswerEngine>>,
    sessions: Arc<RwLock<HashMap<SessionId, Arc<QaSession>>>>,
}

impl SessionManager {
    /// Create a manager loading models through `loader`, caching at most
    /// `cache_capacity` models of each kind.
    pub fn new(loader: Arc<dyn ModelLoader>, cache_capacity: usize) -> Self {
        Self {
            loader,
            embedding_models: Arc::new(ModelCache::new(cache_capacity)),
            answer_engines: Arc::new(ModelCache::new(cache_capacity)),
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// The embedding model cache.
    pub fn embedding_models(&self) -> &ModelCache<dyn EmbeddingProvider> {
        &self.embedding_models
    }

    /// The answer engine cache.
    pub fn answer_engines(&self) -> &ModelCache<dyn AnswerEngine> {
        &self.answer_engines
    }

    /// Create a session with its own empty store.
    ///
    /// If the answer engine cannot be loaded the session is still created,
    /// and questions fail with [`MissingPrecondition::EngineUnavailable`].
    ///
    /// # Errors
    ///
    /// Returns an error if the settings are invalid or the embedding model
    /// cannot be loaded.
    pub async fn create_session(&self, config: QaConfig) -> Result<Arc<QaSession>> {
        config.validate()?;

        let loader = Arc::clone(&self.loader);
        let embedding_provider = self
            .embedding_models
            .get_or_try_load(&config.embedding_model, move |name| async move {
                loader.load_embedding_provider(&name).await
            })
            .await?;

        let qa_model = resolve_qa_model(&config.qa_model).to_string();
        let loader = Arc::clone(&self.loader);
        let answer_engine = match self
            .answer_engines
            .get_or_try_load(&qa_model, move |name| async move {
                loader.load_answer_engine(&name).await
            })
            .await
        {
            Ok(engine) => Some(engine),
            Err(e) => {
                error!(model = %qa_model, error = %e, "failed to load answer engine");
                None
            }
        };

        let session = Arc::new(
            QaSession::builder()
                .config(config)
                .embedding_provider(embedding_provider)
                .maybe_answer_engine(answer_engine)
                .build()?,
        );

        self.sessions.write().await.insert(session.id().to_string(), Arc::clone(&session));
        info!(session = %session.id(), "created session");
        Ok(session)
    }

    /// Look up a session.
    pub async fn get(&self, id: &str) -> Option<Arc<QaSession>> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Remove a session, dropping its store once no caller holds it.
    pub async fn remove(&self, id: &str) -> Option<Arc<QaSession>> {
        self.sessions.write().await.remove(id)
    }

    /// Ids of all live sessions.
    pub async fn session_ids(&self) -> Vec<SessionId> {
        self.sessions.read().await.keys().cloned().collect()
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Returns `true` if there are no live sessions.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
