//! Answer engine trait for question answering over a context string.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// The input of one answer-engine call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRequest {
    /// The user's question.
    pub question: String,
    /// Retrieved chunk texts joined in rank order.
    pub context: String,
    /// Upper bound on the answer length, in tokens of the underlying model.
    pub max_answer_length: usize,
}

/// An answer produced by an [`AnswerEngine`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    /// The answer text.
    pub text: String,
    /// Model confidence in `[0, 1]`.
    pub score: f32,
}

impl Answer {
    /// Create an answer, clamping `score` into `[0, 1]`.
    pub fn new(text: impl Into<String>, score: f32) -> Self {
        let score = if score.is_nan() { 0.0 } else { score.clamp(0.0, 1.0) };
        Self { text: text.into(), score }
    }
}

/// How a question-answering model produces its answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerMode {
    /// Selects a span of the context and reports its probability.
    Extractive,
    /// Generates free text; no probability is available.
    Generative,
}

impl AnswerMode {
    /// T5-family models are text-to-text generators, everything else is extractive.
    pub fn for_model(model_id: &str) -> Self {
        if model_id.to_ascii_lowercase().contains("t5") {
            Self::Generative
        } else {
            Self::Extractive
        }
    }
}

/// A question-answering model.
///
/// Generative engines report a score of `1.0`, since they have no span probability.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{AnswerEngine, AnswerRequest};
///
/// let answer = engine
///     .answer(&AnswerRequest { question, context, max_answer_length: 30 })
///     .await?;
/// println!("{} ({:.2})", answer.text, answer.score);
/// ```
#[async_trait]
pub trait AnswerEngine: Send + Sync {
    /// Answer `request.question` from `request.context`.
    async fn answer(&self, request: &AnswerRequest) -> Result<Answer>;

    /// The model identifier, used in logs and error reports.
    fn model_name(&self) -> &str;
}
