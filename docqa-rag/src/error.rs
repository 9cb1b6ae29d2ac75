//! Error types for the `docqa-rag` crate.

use std::fmt;

use thiserror::Error;

/// A precondition of the question-answering flow that was not met.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingPrecondition {
    /// No chunk has been stored in the session yet.
    NoStoredChunks,
    /// The question was empty or whitespace only.
    EmptyQuestion,
    /// The answer engine failed to load or was never configured.
    EngineUnavailable,
}

impl fmt::Display for MissingPrecondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            Self::NoStoredChunks => "no document has been processed yet",
            Self::EmptyQuestion => "please enter a question",
            Self::EngineUnavailable => "the question-answering engine is not loaded",
        };
        f.write_str(message)
    }
}

/// Errors that can occur while ingesting documents or answering questions.
#[derive(Debug, Error)]
pub enum DocQaError {
    /// A document could not be turned into text. Only that document is skipped.
    #[error("Ingestion error ({document}): {message}")]
    Ingestion {
        /// The name of the document that failed.
        document: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    Embedding {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred during text chunking.
    #[error("Chunking error: {0}")]
    Chunking(String),

    /// An error occurred in the vector store backend.
    #[error("Vector store error ({backend}): {message}")]
    VectorStore {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// The answer engine failed while producing an answer.
    #[error("Answer engine error ({engine}): {message}")]
    AnswerEngine {
        /// The answer engine that produced the error.
        engine: String,
        /// A description of the failure.
        message: String,
    },

    /// A model could not be loaded.
    #[error("Model load error ({model}): {message}")]
    ModelLoad {
        /// The model identifier that failed to load.
        model: String,
        /// A description of the failure.
        message: String,
    },

    /// The question-answering flow was not attempted.
    #[error("Precondition failed: {0}")]
    Precondition(MissingPrecondition),

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Reading or writing a settings file failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A settings file could not be (de)serialized.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl DocQaError {
    /// Returns the missing precondition if this is a [`DocQaError::Precondition`].
    pub fn precondition(&self) -> Option<MissingPrecondition> {
        match self {
            Self::Precondition(missing) => Some(*missing),
            _ => None,
        }
    }
}

/// A convenience result type for document QA operations.
pub type Result<T> = std::result::Result<T, DocQaError>;
