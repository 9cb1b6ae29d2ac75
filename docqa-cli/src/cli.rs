use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use docqa_rag::{ChunkingStrategyKind, QaConfig};

/// Ask questions about your documents
#[derive(Parser, Debug)]
#[command(name = "docqa")]
#[command(version)]
#[command(about = "Ask questions about PDF and text documents with retrieval-augmented QA", long_about = None)]
pub struct Cli {
    /// Documents to ingest (.pdf, .txt and .md)
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Ask one question and exit instead of starting the prompt
    #[arg(short, long)]
    pub question: Option<String>,

    /// Load settings from a JSON file
    #[arg(short, long, env = "DOCQA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Write the effective settings to a JSON file
    #[arg(long)]
    pub save_config: Option<PathBuf>,

    /// Chunking strategy (fixed_with_overlap, fixed_without_overlap, semantic)
    #[arg(long)]
    pub chunking: Option<ChunkingStrategyKind>,

    /// Chunk size in characters
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Chunk overlap in characters
    #[arg(long)]
    pub overlap: Option<usize>,

    /// Sentence-transformer embedding model
    #[arg(long)]
    pub embedding_model: Option<String>,

    /// Question-answering model id or display name
    #[arg(long)]
    pub qa_model: Option<String>,

    /// Maximum answer length passed to the model (5-50)
    #[arg(long)]
    pub max_answer_len: Option<usize>,

    /// Answers scoring below this are withheld (0-1)
    #[arg(long)]
    pub min_score: Option<f32>,

    /// Number of chunks used as context
    #[arg(long)]
    pub top_k: Option<usize>,

    /// Hugging Face API token
    #[arg(long, env = "HF_API_TOKEN", hide_env_values = true)]
    pub hf_token: Option<String>,

    /// Base URL of the Hugging Face inference endpoint
    #[arg(long, env = "DOCQA_HF_URL")]
    pub hf_url: Option<String>,
}

impl Cli {
    /// Settings from `--config` (or the defaults) with flag overrides applied.
    ///
    /// With `--chunking semantic`, `--chunk-size` and `--overlap` set the
    /// semantic chunk parameters.
    pub fn settings(&self) -> Result<QaConfig> {
        let mut config = match &self.config {
            Some(path) => QaConfig::load(path)
                .with_context(|| format!("failed to load settings from {}", path.display()))?,
            None => QaConfig::default(),
        };

        if let Some(kind) = self.chunking {
            config.chunking_strategy = kind;
        }
        let semantic = config.chunking_strategy == ChunkingStrategyKind::Semantic;
        if let Some(size) = self.chunk_size {
            if semantic {
                config.semantic_chunk_size = size;
            } else {
                config.chunk_size = size;
            }
        }
        if let Some(overlap) = self.overlap {
            if semantic {
                config.semantic_chunk_overlap = overlap;
            } else {
                config.overlap = overlap;
            }
        }
        if let Some(model) = &self.embedding_model {
            config.embedding_model = model.clone();
        }
        if let Some(model) = &self.qa_model {
            config.qa_model = model.clone();
        }
        if let Some(length) = self.max_answer_len {
            config.max_answer_length = length;
        }
        if let Some(score) = self.min_score {
            config.min_score_threshold = score;
        }
        if let Some(k) = self.top_k {
            config.top_k = k;
        }

        config.validate().context("invalid settings")?;
        Ok(config)
    }
}
