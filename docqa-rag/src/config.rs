//! Configuration for a question-answering session.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::chunking::{ChunkingStrategy, ChunkingStrategyKind};
use crate::error::{DocQaError, Result};
use crate::models::{DEFAULT_EMBEDDING_MODEL, DEFAULT_QA_MODEL};

/// Allowed range for [`QaConfig::max_answer_length`].
pub const MAX_ANSWER_LENGTH_RANGE: std::ops::RangeInclusive<usize> = 5..=50;

/// Session settings, stored as a flat key/value structure.
///
/// Missing keys in a settings file fall back to the defaults, so older files
/// keep loading as fields are added.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QaConfig {
    /// Which chunking strategy to use.
    pub chunking_strategy: ChunkingStrategyKind,
    /// Chunk size in characters for the fixed strategies.
    pub chunk_size: usize,
    /// Overlap in characters for the fixed-with-overlap strategy.
    pub overlap: usize,
    /// Chunk size for semantic chunking.
    pub semantic_chunk_size: usize,
    /// Overlap for semantic chunking.
    pub semantic_chunk_overlap: usize,
    /// Embedding model identifier.
    pub embedding_model: String,
    /// Question-answering model identifier.
    pub qa_model: String,
    /// Upper bound on the answer length passed to the answer engine.
    pub max_answer_length: usize,
    /// Answers scoring below this are withheld.
    pub min_score_threshold: f32,
    /// Number of chunks retrieved per question.
    pub top_k: usize,
    /// Characters kept on each side of a highlighted answer.
    pub context_window: usize,
    /// Number of loaded models kept per model kind.
    pub model_cache_capacity: usize,
}

impl Default for QaConfig {
    fn default() -> Self {
        Self {
            chunking_strategy: ChunkingStrategyKind::FixedWithOverlap,
            chunk_size: 1000,
            overlap: 200,
            semantic_chunk_size: 500,
            semantic_chunk_overlap: 50,
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            qa_model: DEFAULT_QA_MODEL.to_string(),
            max_answer_length: 30,
            min_score_threshold: 0.2,
            top_k: 5,
            context_window: 100,
            model_cache_capacity: 4,
        }
    }
}

impl QaConfig {
    /// Create a new builder for constructing a [`QaConfig`].
    pub fn builder() -> QaConfigBuilder {
        QaConfigBuilder::default()
    }

    /// The chunking strategy described by these settings.
    pub fn strategy(&self) -> ChunkingStrategy {
        match self.chunking_strategy {
            ChunkingStrategyKind::FixedWithOverlap => ChunkingStrategy::FixedWithOverlap {
                chunk_size: self.chunk_size,
                overlap: self.overlap,
            },
            ChunkingStrategyKind::FixedWithoutOverlap => {
                ChunkingStrategy::FixedWithoutOverlap { chunk_size: self.chunk_size }
            }
            ChunkingStrategyKind::Semantic => ChunkingStrategy::Semantic {
                chunk_size: self.semantic_chunk_size,
                chunk_overlap: self.semantic_chunk_overlap,
            },
        }
    }

    /// Check that the settings are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`DocQaError::Config`] if:
    /// - the selected chunking strategy has `overlap >= chunk_size` or a zero size
    /// - `max_answer_length` is outside `5..=50`
    /// - `min_score_threshold` is outside `[0, 1]`
    /// - `top_k` or `model_cache_capacity` is zero
    /// - a model identifier is empty
    pub fn validate(&self) -> Result<()> {
        self.strategy().validate().map_err(|e| DocQaError::Config(e.to_string()))?;
        if !MAX_ANSWER_LENGTH_RANGE.contains(&self.max_answer_length) {
            return Err(DocQaError::Config(format!(
                "max_answer_length ({}) must be between {} and {}",
                self.max_answer_length,
                MAX_ANSWER_LENGTH_RANGE.start(),
                MAX_ANSWER_LENGTH_RANGE.end()
            )));
        }
        if !(0.0..=1.0).contains(&self.min_score_threshold) {
            return Err(DocQaError::Config(format!(
                "min_score_threshold ({}) must be between 0 and 1",
                self.min_score_threshold
            )));
        }
        if self.top_k == 0 {
            return Err(DocQaError::Config("top_k must be greater than zero".to_string()));
        }
        if self.model_cache_capacity == 0 {
            return Err(DocQaError::Config(
                "model_cache_capacity must be greater than zero".to_string(),
            ));
        }
        if self.embedding_model.trim().is_empty() || self.qa_model.trim().is_empty() {
            return Err(DocQaError::Config("model identifiers must not be empty".to_string()));
        }
        Ok(())
    }

    /// Parse and validate settings from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the settings as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load and validate settings from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Write the settings to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// The settings as flat string pairs, for recording alongside results.
    pub fn to_key_values(&self) -> Result<BTreeMap<String, String>> {
        let value = serde_json::to_value(self)?;
        let Some(object) = value.as_object() else {
            return Ok(BTreeMap::new());
        };
        Ok(object
            .iter()
            .map(|(key, value)| {
                let value = match value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), value)
            })
            .collect())
    }
}

/// Builder for constructing a validated [`QaConfig`].
#[derive(Debug, Clone, Default)]
pub struct QaConfigBuilder {
    config: QaConfig,
}

impl QaConfigBuilder {
    /// Set the chunking strategy.
    pub fn chunking_strategy(mut self, kind: ChunkingStrategyKind) -> Self {
        self.config.chunking_strategy = kind;
        self
    }

    /// Set the chunk size for the fixed strategies.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap for the fixed-with-overlap strategy.
    pub fn overlap(mut self, overlap: usize) -> Self {
        self.config.overlap = overlap;
        self
    }

    /// Set the chunk size and overlap used by semantic chunking.
    pub fn semantic_chunking(mut self, chunk_size: usize, chunk_overlap: usize) -> Self {
        self.config.semantic_chunk_size = chunk_size;
        self.config.semantic_chunk_overlap = chunk_overlap;
        self
    }

    /// Set the embedding model identifier.
    pub fn embedding_model(mut self, model: impl Into<String>) -> Self {
        self.config.embedding_model = model.into();
        self
    }

    /// Set the question-answering model identifier.
    pub fn qa_model(mut self, model: impl Into<String>) -> Self {
        self.config.qa_model = model.into();
        self
    }

    /// Set the maximum answer length.
    pub fn max_answer_length(mut self, length: usize) -> Self {
        self.config.max_answer_length = length;
        self
    }

    /// Set the minimum confidence for an answer to be shown.
    pub fn min_score_threshold(mut self, threshold: f32) -> Self {
        self.config.min_score_threshold = threshold;
        self
    }

    /// Set the number of chunks retrieved per question.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the highlight window in characters.
    pub fn context_window(mut self, window: usize) -> Self {
        self.config.context_window = window;
        self
    }

    /// Set how many loaded models are kept per model kind.
    pub fn model_cache_capacity(mut self, capacity: usize) -> Self {
        self.config.model_cache_capacity = capacity;
        self
    }

    /// Build the [`QaConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`QaConfig::validate`].
    pub fn build(self) -> Result<QaConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
