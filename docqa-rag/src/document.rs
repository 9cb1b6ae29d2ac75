//! Data types for documents, chunks, and retrieval results.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The extracted text of one uploaded file, identified by its file name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    /// The file name the text was extracted from.
    pub name: String,
    /// The full extracted text.
    pub text: String,
}

impl Document {
    /// Create a new document.
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self { name: name.into(), text: text.into() }
    }
}

/// Identifies a chunk by its parent document and its position in the chunk sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkId {
    /// The name of the parent [`Document`].
    pub document: String,
    /// Position of the chunk in the sequence produced by the chunker.
    pub index: usize,
}

impl ChunkId {
    /// Create a new chunk identifier.
    pub fn new(document: impl Into<String>, index: usize) -> Self {
        Self { document: document.into(), index }
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_chunk_{}", self.document, self.index)
    }
}

/// A piece of text produced by a chunking strategy.
///
/// Offsets are character positions in the source text. Strategies that do not
/// track positions report `None` rather than guessing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkSpan {
    /// The chunk text.
    pub text: String,
    /// Character offset of the first character, if known.
    pub start: Option<usize>,
    /// Character offset one past the last character, if known.
    pub end: Option<usize>,
}

/// Source information kept alongside every stored chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// The name of the parent document.
    pub document: String,
    /// Character offset of the chunk start, if known.
    pub start: Option<usize>,
    /// Character offset of the chunk end, if known.
    pub end: Option<usize>,
}

/// A vector store entry: the embedding, text, and metadata of one chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredChunk {
    /// The chunk identifier.
    pub id: ChunkId,
    /// The embedding of the chunk text.
    pub embedding: Vec<f32>,
    /// The chunk text.
    pub text: String,
    /// Where the chunk came from.
    pub metadata: ChunkMetadata,
}

/// A retrieved chunk paired with its similarity to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    /// The chunk identifier.
    pub id: ChunkId,
    /// The chunk text.
    pub text: String,
    /// Where the chunk came from.
    pub metadata: ChunkMetadata,
    /// Cosine similarity to the query, or the sentinel score when it could not be computed.
    pub score: f32,
    /// `true` when the similarity could not be computed for this chunk.
    pub degraded: bool,
}
