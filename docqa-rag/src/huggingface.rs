//! Hugging Face Inference API embedding provider and answer engine.
//!
//! This module is only available when the `huggingface` feature is enabled.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error};

use crate::answer::{Answer, AnswerEngine, AnswerMode, AnswerRequest};
use crate::embedding::EmbeddingProvider;
use crate::error::{DocQaError, Result};
use crate::http::JsonClient;
use crate::models::ModelLoader;

/// The default Hugging Face Inference API endpoint.
const HF_INFERENCE_URL: &str = "https://api-inference.huggingface.co";

/// The environment variable holding the API token.
pub const HF_TOKEN_ENV: &str = "HF_API_TOKEN";

/// Bare sentence-transformer names live under this organisation on the Hub.
const SENTENCE_TRANSFORMERS_ORG: &str = "sentence-transformers";

/// Expand a bare sentence-transformer name to a Hub model id.
pub fn hub_embedding_model_id(name: &str) -> String {
    if name.contains('/') {
        name.to_string()
    } else {
        format!("{SENTENCE_TRANSFORMERS_ORG}/{name}")
    }
}

// ── Embeddings ─────────────────────────────────────────────────────

/// Feature-extraction output: pooled sentence vectors or per-token vectors.
#[derive(Deserialize)]
#[serde(untagged)]
enum FeatureOutput {
    Pooled(Vec<f32>),
    Tokens(Vec<Vec<f32>>),
}

impl FeatureOutput {
    fn into_sentence_vector(self) -> Vec<f32> {
        match self {
            Self::Pooled(vector) => vector,
            Self::Tokens(tokens) => mean_pool(&tokens),
        }
    }
}

/// Average per-token vectors into one sentence vector.
fn mean_pool(tokens: &[Vec<f32>]) -> Vec<f32> {
    let Some(first) = tokens.first() else {
        return Vec::new();
    };
    let mut pooled = vec![0.0f32; first.len()];
    for token in tokens {
        for (acc, value) in pooled.iter_mut().zip(token) {
            *acc += value;
        }
    }
    let count = tokens.len() as f32;
    pooled.iter_mut().for_each(|v| *v /= count);
    pooled
}

/// An [`EmbeddingProvider`] backed by the Inference API feature-extraction pipeline.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::huggingface::HuggingFaceEmbeddingProvider;
///
/// let provider = HuggingFaceEmbeddingProvider::from_env("all-mpnet-base-v2");
/// let embedding = provider.embed("hello world").await?;
/// ```
#[derive(Clone)]
pub struct HuggingFaceEmbeddingProvider {
    client: JsonClient,
    model: String,
    hub_id: String,
}

impl HuggingFaceEmbeddingProvider {
    /// Create a provider for `model` with an optional API token.
    pub fn new(model: impl Into<String>, api_token: Option<String>) -> Self {
        Self::with_client(model, JsonClient::new(HF_INFERENCE_URL, api_token))
    }

    /// Create a provider reading the token from `HF_API_TOKEN`.
    pub fn from_env(model: impl Into<String>) -> Self {
        Self::new(model, std::env::var(HF_TOKEN_ENV).ok())
    }

    fn with_client(model: impl Into<String>, client: JsonClient) -> Self {
        let model = model.into();
        let hub_id = hub_embedding_model_id(&model);
        Self { client, model, hub_id }
    }

    /// Point the provider at a different Inference API base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.client.base_url = base_url.into();
        self
    }

    fn failure(&self, message: impl Into<String>) -> DocQaError {
        DocQaError::Embedding { provider: self.model.clone(), message: message.into() }
    }
}

#[async_trait]
impl EmbeddingProvider for HuggingFaceEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text]).await?;
        results.into_iter().next().ok_or_else(|| self.failure("API returned empty response"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if texts.iter().any(|t| t.trim().is_empty()) {
            return Err(self.failure("cannot embed empty text"));
        }

        debug!(provider = "HuggingFace", model = %self.hub_id, batch_size = texts.len(), "embedding batch");

        let body = json!({ "inputs": texts, "options": { "wait_for_model": true } });
        let path = format!("pipeline/feature-extraction/{}", self.hub_id);
        let outputs: Vec<FeatureOutput> = self.client.post(&path, &body).await.map_err(|e| {
            error!(provider = "HuggingFace", model = %self.hub_id, error = %e, "embedding request failed");
            self.failure(e)
        })?;

        if outputs.len() != texts.len() {
            return Err(self.failure(format!(
                "API returned {} embeddings for {} inputs",
                outputs.len(),
                texts.len()
            )));
        }

        Ok(outputs.into_iter().map(FeatureOutput::into_sentence_vector).collect())
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

// ── Question answering ─────────────────────────────────────────────

#[derive(Deserialize)]
struct ExtractiveAnswer {
    answer: String,
    score: f32,
}

#[derive(Deserialize)]
struct GeneratedText {
    generated_text: String,
}

/// An [`AnswerEngine`] backed by the Inference API.
///
/// Extractive models use the question-answering task; T5-family models use
/// text-to-text generation and report a score of `1.0`.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::huggingface::HuggingFaceAnswerEngine;
///
/// let engine = HuggingFaceAnswerEngine::from_env("deepset/roberta-base-squad2");
/// ```
#[derive(Clone)]
pub struct HuggingFaceAnswerEngine {
    client: JsonClient,
    model: String,
    mode: AnswerMode,
}

impl HuggingFaceAnswerEngine {
    /// Create an engine for `model` with an optional API token.
    pub fn new(model: impl Into<String>, api_token: Option<String>) -> Self {
        Self::with_client(model, JsonClient::new(HF_INFERENCE_URL, api_token))
    }

    /// Create an engine reading the token from `HF_API_TOKEN`.
    pub fn from_env(model: impl Into<String>) -> Self {
        Self::new(model, std::env::var(HF_TOKEN_ENV).ok())
    }

    fn with_client(model: impl Into<String>, client: JsonClient) -> Self {
        let model = model.into();
        let mode = AnswerMode::for_model(&model);
        Self { client, model, mode }
    }

    /// Point the engine at a different Inference API base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.client.base_url = base_url.into();
        self
    }

    /// Whether the model extracts or generates answers.
    pub fn mode(&self) -> AnswerMode {
        self.mode
    }

    fn failure(&self, message: impl Into<String>) -> DocQaError {
        DocQaError::AnswerEngine { engine: self.model.clone(), message: message.into() }
    }
}

#[async_trait]
impl AnswerEngine for HuggingFaceAnswerEngine {
    async fn answer(&self, request: &AnswerRequest) -> Result<Answer> {
        let path = format!("models/{}", self.model);
        debug!(engine = %self.model, mode = ?self.mode, context_len = request.context.len(), "answering");

        match self.mode {
            AnswerMode::Extractive => {
                let body = json!({
                    "inputs": { "question": request.question, "context": request.context },
                    "parameters": { "max_answer_len": request.max_answer_length },
                    "options": { "wait_for_model": true },
                });
                let answer: ExtractiveAnswer =
                    self.client.post(&path, &body).await.map_err(|e| self.failure(e))?;
                Ok(Answer::new(answer.answer, answer.score))
            }
            AnswerMode::Generative => {
                let body = json!({
                    "inputs": format!("question: {} context: {}", request.question, request.context),
                    "parameters": { "max_new_tokens": request.max_answer_length },
                    "options": { "wait_for_model": true },
                });
                let generated: Vec<GeneratedText> =
                    self.client.post(&path, &body).await.map_err(|e| self.failure(e))?;
                let text = generated
                    .into_iter()
                    .next()
                    .map(|g| g.generated_text)
                    .ok_or_else(|| self.failure("API returned no generated text"))?;
                Ok(Answer::new(text.trim(), 1.0))
            }
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

// ── Model loading ──────────────────────────────────────────────────

/// A [`ModelLoader`] producing Inference API clients.
///
/// Models run remotely, so loading only builds a client; all clients share
/// one connection pool.
#[derive(Clone)]
pub struct HuggingFaceLoader {
    client: JsonClient,
}

impl HuggingFaceLoader {
    /// Create a loader with an optional API token.
    pub fn new(api_token: Option<String>) -> Self {
        Self { client: JsonClient::new(HF_INFERENCE_URL, api_token) }
    }

    /// Create a loader reading the token from `HF_API_TOKEN`.
    pub fn from_env() -> Self {
        Self::new(std::env::var(HF_TOKEN_ENV).ok())
    }

    /// Point every loaded model at a different Inference API base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.client.base_url = base_url.into();
        self
    }
}

fn check_model_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(DocQaError::ModelLoad {
            model: name.to_string(),
            message: "model name must not be empty".to_string(),
        });
    }
    Ok(())
}

#[async_trait]
impl ModelLoader for HuggingFaceLoader {
    async fn load_embedding_provider(&self, name: &str) -> Result<Arc<dyn EmbeddingProvider>> {
        check_model_name(name)?;
        Ok(Arc::new(HuggingFaceEmbeddingProvider::with_client(name, self.client.clone())))
    }

    async fn load_answer_engine(&self, name: &str) -> Result<Arc<dyn AnswerEngine>> {
        check_model_name(name)?;
        Ok(Arc::new(HuggingFaceAnswerEngine::with_client(name, self.client.clone())))
    }
}
