//! # docqa-rag
//!
//! Question answering over uploaded documents: text is split into chunks,
//! embedded, kept in a session-scoped in-memory store, and the chunks most
//! similar to a question are handed to a question-answering model as context.
//!
//! ## Pipeline
//!
//! ```text
//! ingest: file → text → chunks → embeddings → store
//! ask:    question → embedding → top-k chunks → context → answer → threshold → highlight
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use docqa_rag::{Document, QaConfig, QaSession, QueryOutcome};
//!
//! let session = QaSession::builder()
//!     .config(QaConfig::builder().chunk_size(500).overlap(100).build()?)
//!     .embedding_provider(Arc::new(embedder))
//!     .answer_engine(Arc::new(engine))
//!     .build()?;
//!
//! session.ingest_documents(&[Document::new("notes.txt", text)]).await;
//! match session.ask("Who wrote the report?").await? {
//!     QueryOutcome::Answered(answered) => println!("{}", answered.answer.text),
//!     QueryOutcome::LowConfidence { notice, .. } => println!("{notice}"),
//! }
//! ```
//!
//! ## Features
//!
//! - `huggingface`: Hugging Face Inference API embeddings and question answering
//! - `openai`: OpenAI embeddings
//! - `pdf`: text extraction from `.pdf` uploads
//! - `full`: everything above

pub mod answer;
pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod highlight;
pub mod inmemory;
pub mod models;
pub mod retrieval;
pub mod session;
pub mod source;
pub mod vectorstore;

#[cfg(any(feature = "huggingface", feature = "openai"))]
mod http;

#[cfg(feature = "huggingface")]
pub mod huggingface;

#[cfg(feature = "openai")]
pub mod openai;

#[cfg(feature = "pdf")]
pub mod pdf;

pub use answer::{Answer, AnswerEngine, AnswerMode, AnswerRequest};
pub use chunking::{ChunkingStrategy, ChunkingStrategyKind, RecursiveSplitter, TextSplitter};
pub use config::{QaConfig, QaConfigBuilder};
pub use document::{ChunkId, ChunkMetadata, ChunkSpan, Document, ScoredChunk, StoredChunk};
pub use embedding::EmbeddingProvider;
pub use error::{DocQaError, MissingPrecondition, Result};
pub use highlight::{Highlight, HighlightMarkers};
pub use inmemory::InMemoryVectorStore;
pub use models::{ModelCache, ModelLoader};
pub use retrieval::{Retrieval, Retriever, SENTINEL_SCORE, cosine_similarity};
pub use session::{
    AnsweredQuery, DocumentReport, DroppedChunk, IngestFailure, IngestReport, QaSession,
    QaSessionBuilder, QueryOutcome, SessionId, SessionManager,
};
pub use source::{ExtractorSet, PlainTextExtractor, SourceFile, TextExtractor};

#[cfg(feature = "pdf")]
pub use pdf::PdfTextExtractor;
pub use vectorstore::VectorStore;
