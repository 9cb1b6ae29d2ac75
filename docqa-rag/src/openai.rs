//! OpenAI embeddings through the `/v1/embeddings` endpoint.
//!
//! This module is only available when the `openai` feature is enabled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::EmbeddingProvider;
use crate::error::{DocQaError, Result};
use crate::http::JsonClient;

const OPENAI_API_URL: &str = "https://api.openai.com/v1";

/// The environment variable holding the API key.
pub const OPENAI_KEY_ENV: &str = "OPENAI_API_KEY";

const DEFAULT_MODEL: &str = "text-embedding-3-small";

/// An [`EmbeddingProvider`] backed by OpenAI embedding models.
///
/// Defaults to `text-embedding-3-small`. A whole batch goes out in one
/// request and comes back in input order.
///
/// ```rust,ignore
/// use docqa_rag::openai::OpenAIEmbeddingProvider;
///
/// let provider = OpenAIEmbeddingProvider::from_env()?.with_dimensions(512);
/// let vectors = provider.embed_batch(&["first chunk", "second chunk"]).await?;
/// ```
#[derive(Clone)]
pub struct OpenAIEmbeddingProvider {
    client: JsonClient,
    model: String,
    dimensions: Option<usize>,
}

impl OpenAIEmbeddingProvider {
    /// Create a provider authenticating with `api_key`.
    ///
    /// # Errors
    ///
    /// Returns [`DocQaError::ModelLoad`] for a blank key.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(DocQaError::ModelLoad {
                model: DEFAULT_MODEL.to_string(),
                message: "OpenAI API key must not be empty".to_string(),
            });
        }
        Ok(Self {
            client: JsonClient::new(OPENAI_API_URL, Some(api_key)),
            model: DEFAULT_MODEL.to_string(),
            dimensions: None,
        })
    }

    /// Create a provider reading the key from `OPENAI_API_KEY`.
    pub fn from_env() -> Result<Self> {
        let key = std::env::var(OPENAI_KEY_ENV).map_err(|_| DocQaError::ModelLoad {
            model: DEFAULT_MODEL.to_string(),
            message: format!("{OPENAI_KEY_ENV} is not set"),
        })?;
        Self::new(key)
    }

    /// Use another embedding model, e.g. `text-embedding-3-large`.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Request vectors shortened to `dimensions`.
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    /// Send requests to another OpenAI-compatible base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.client.base_url = base_url.into();
        self
    }

    fn failure(&self, message: impl Into<String>) -> DocQaError {
        DocQaError::Embedding { provider: format!("openai/{}", self.model), message: message.into() }
    }
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

/// Put items back in input order, checking each input got exactly one vector.
fn in_input_order(mut items: Vec<EmbeddingItem>, expected: usize) -> std::result::Result<Vec<Vec<f32>>, String> {
    items.sort_by_key(|item| item.index);
    let complete = items.len() == expected && items.iter().enumerate().all(|(i, item)| item.index == i);
    if !complete {
        return Err(format!("expected {expected} embeddings, got {}", items.len()));
    }
    Ok(items.into_iter().map(|item| item.embedding).collect())
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])
            .await?
            .pop()
            .ok_or_else(|| self.failure("no embedding returned"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(blank) = texts.iter().position(|t| t.trim().is_empty()) {
            return Err(self.failure(format!("input {blank} is empty")));
        }

        debug!(provider = "openai", model = %self.model, batch_size = texts.len(), "embedding batch");

        let request = EmbeddingsRequest { model: &self.model, input: texts, dimensions: self.dimensions };
        let response: EmbeddingsResponse =
            self.client.post("embeddings", &request).await.map_err(|e| {
                error!(provider = "openai", model = %self.model, error = %e, "embedding request failed");
                self.failure(e)
            })?;

        in_input_order(response.data, texts.len()).map_err(|e| self.failure(e))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(index: usize, value: f32) -> EmbeddingItem {
        EmbeddingItem { index, embedding: vec![value] }
    }

    #[test]
    fn blank_key_is_rejected() {
        assert!(matches!(OpenAIEmbeddingProvider::new("  "), Err(DocQaError::ModelLoad { .. })));
    }

    #[test]
    fn dimensions_are_only_sent_when_set() {
        let input = ["a"];
        let body = EmbeddingsRequest { model: "m", input: &input, dimensions: None };
        assert!(serde_json::to_value(&body).unwrap().get("dimensions").is_none());
        let body = EmbeddingsRequest { model: "m", input: &input, dimensions: Some(256) };
        assert_eq!(serde_json::to_value(&body).unwrap()["dimensions"], 256);
    }

    #[test]
    fn results_are_reordered_by_index() {
        let ordered = in_input_order(vec![item(1, 1.0), item(0, 0.0), item(2, 2.0)], 3).unwrap();
        assert_eq!(ordered, vec![vec![0.0], vec![1.0], vec![2.0]]);
    }

    #[test]
    fn missing_results_are_an_error() {
        assert!(in_input_order(vec![item(0, 0.0), item(2, 2.0)], 3).is_err());
        assert!(in_input_order(vec![item(0, 0.0), item(0, 0.5)], 2).is_err());
    }

    #[tokio::test]
    async fn blank_input_fails_before_any_request() {
        let provider = OpenAIEmbeddingProvider::new("sk-test").unwrap().with_base_url("http://127.0.0.1:9");
        let err = provider.embed_batch(&["ok", " "]).await.unwrap_err();
        assert!(err.to_string().contains("input 1 is empty"));
    }
}
