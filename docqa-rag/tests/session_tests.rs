//! End-to-end tests for ingestion and question answering with local model doubles.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use docqa_rag::session::LOW_CONFIDENCE_NOTICE;
use docqa_rag::{
    Answer, AnswerEngine, AnswerRequest, ChunkId, ChunkMetadata, ChunkingStrategyKind, DocQaError,
    Document, EmbeddingProvider, MissingPrecondition, ModelLoader, QaConfig, QaSession,
    QueryOutcome, Result, SessionManager, SourceFile, StoredChunk, VectorStore,
};

/// Letter-frequency embedding with a constant bias dimension.
///
/// Texts containing one of `fail_on` fail to embed; texts containing
/// `ZERO` embed to an all-zero vector.
struct LetterEmbedder {
    fail_on: Vec<String>,
    calls: AtomicUsize,
}

impl LetterEmbedder {
    fn new() -> Self {
        Self { fail_on: Vec::new(), calls: AtomicUsize::new(0) }
    }

    fn failing_on(marker: &str) -> Self {
        Self { fail_on: vec![marker.to_string()], calls: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl EmbeddingProvider for LetterEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_on.iter().any(|marker| text.contains(marker.as_str())) {
            return Err(DocQaError::Embedding {
                provider: "letters".into(),
                message: "model refused input".into(),
            });
        }
        if text.contains("ZERO") {
            return Ok(vec![0.0; 27]);
        }
        let mut v = vec![0.0f32; 27];
        for c in text.chars().filter(char::is_ascii_alphabetic) {
            v[(c.to_ascii_lowercase() as u8 - b'a') as usize] += 1.0;
        }
        v[26] = 1.0;
        Ok(v)
    }

    fn model_name(&self) -> &str {
        "letters"
    }
}

/// Returns a fixed answer and records every request it sees.
struct ScriptedEngine {
    reply: std::result::Result<(String, f32), String>,
    requests: Mutex<Vec<AnswerRequest>>,
}

impl ScriptedEngine {
    fn answering(text: &str, score: f32) -> Self {
        Self { reply: Ok((text.to_string(), score)), requests: Mutex::new(Vec::new()) }
    }

    fn failing(message: &str) -> Self {
        Self { reply: Err(message.to_string()), requests: Mutex::new(Vec::new()) }
    }

    fn requests(&self) -> Vec<AnswerRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnswerEngine for ScriptedEngine {
    async fn answer(&self, request: &AnswerRequest) -> Result<Answer> {
        self.requests.lock().unwrap().push(request.clone());
        match &self.reply {
            Ok((text, score)) => Ok(Answer::new(text.clone(), *score)),
            Err(message) => Err(DocQaError::ModelLoad {
                model: "scripted".into(),
                message: message.clone(),
            }),
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

fn session_with(
    config: QaConfig,
    embedder: Arc<LetterEmbedder>,
    engine: Option<Arc<ScriptedEngine>>,
) -> QaSession {
    QaSession::builder()
        .config(config)
        .embedding_provider(embedder)
        .maybe_answer_engine(engine.map(|e| e as Arc<dyn AnswerEngine>))
        .build()
        .unwrap()
}

#[tokio::test]
async fn scenario_c_low_confidence_withholds_the_answer() {
    let engine = Arc::new(ScriptedEngine::answering("the budget", 0.15));
    let session = session_with(QaConfig::default(), Arc::new(LetterEmbedder::new()), Some(engine));
    session.ingest_documents(&[Document::new("plan.txt", "The budget was approved in March.")]).await;

    let outcome = session.ask("When was the budget approved?").await.unwrap();

    assert!(outcome.is_low_confidence());
    assert!(outcome.answer().is_none());
    match outcome {
        QueryOutcome::LowConfidence { score, threshold, notice, sources } => {
            assert!((score - 0.15).abs() < 1e-6);
            assert!((threshold - 0.2).abs() < 1e-6);
            assert_eq!(notice, LOW_CONFIDENCE_NOTICE);
            assert_eq!(sources, vec![ChunkId::new("plan.txt", 0)]);
        }
        QueryOutcome::Answered(_) => panic!("answer should have been withheld"),
    }
}

#[tokio::test]
async fn answer_exactly_at_threshold_is_shown() {
    let engine = Arc::new(ScriptedEngine::answering("March", 0.2));
    let session = session_with(QaConfig::default(), Arc::new(LetterEmbedder::new()), Some(engine));
    session.ingest_documents(&[Document::new("plan.txt", "The budget was approved in March.")]).await;

    let outcome = session.ask("When?").await.unwrap();
    assert_eq!(outcome.answer().map(|a| a.text.as_str()), Some("March"));
}

#[tokio::test]
async fn scenario_d_highlight_window_around_answer() {
    let text = format!("{}42{}", "a".repeat(500), "b".repeat(300));
    let engine = Arc::new(ScriptedEngine::answering("42", 0.9));
    let config = QaConfig::builder()
        .chunking_strategy(ChunkingStrategyKind::FixedWithoutOverlap)
        .chunk_size(1000)
        .build()
        .unwrap();
    let session = session_with(config, Arc::new(LetterEmbedder::new()), Some(engine.clone()));
    session.ingest_documents(&[Document::new("numbers.txt", text.clone())]).await;

    assert_eq!(session.chunk_count().await.unwrap(), 1);

    let QueryOutcome::Answered(answered) = session.ask("What is the number?").await.unwrap() else {
        panic!("expected an answer");
    };

    assert_eq!(answered.context, text);
    let highlight = answered.highlight.expect("answer occurs in context");
    assert_eq!(highlight.window_start, 400);
    assert_eq!(highlight.window_end, 602);
    assert_eq!((highlight.match_start, highlight.match_end), (500, 502));
    assert_eq!(
        highlight.snippet,
        format!("{}<mark>42</mark>{}", "a".repeat(100), "b".repeat(100))
    );
    assert_eq!(engine.requests()[0].max_answer_length, 30);
}

#[tokio::test]
async fn answer_missing_from_context_has_no_highlight() {
    let engine = Arc::new(ScriptedEngine::answering("Lisbon", 0.8));
    let session = session_with(QaConfig::default(), Arc::new(LetterEmbedder::new()), Some(engine));
    session.ingest_documents(&[Document::new("cities.txt", "Madrid is in Spain.")]).await;

    let outcome = session.ask("Which city?").await.unwrap();
    let QueryOutcome::Answered(answered) = outcome else { panic!("expected an answer") };
    assert_eq!(answered.answer.text, "Lisbon");
    assert!(answered.highlight.is_none());
}

#[tokio::test]
async fn scenario_e_query_embedding_failure_leaves_store_unchanged() {
    let embedder = Arc::new(LetterEmbedder::failing_on("FAIL"));
    let engine = Arc::new(ScriptedEngine::answering("x", 0.9));
    let session = session_with(QaConfig::default(), embedder, Some(engine.clone()));
    session.ingest_documents(&[Document::new("a.txt", "alpha beta gamma")]).await;
    let before = session.vector_store().get_all().await.unwrap();

    let err = session.ask("FAIL this question").await.unwrap_err();

    assert!(matches!(err, DocQaError::Embedding { .. }));
    assert_eq!(session.vector_store().get_all().await.unwrap(), before);
    assert!(engine.requests().is_empty());
}

#[tokio::test]
async fn preconditions_are_checked_in_order() {
    let engine = Arc::new(ScriptedEngine::answering("x", 0.9));
    let session = session_with(QaConfig::default(), Arc::new(LetterEmbedder::new()), Some(engine));

    let err = session.ask("   ").await.unwrap_err();
    assert_eq!(err.precondition(), Some(MissingPrecondition::NoStoredChunks));

    session.ingest_documents(&[Document::new("a.txt", "some text")]).await;
    let err = session.ask(" \n\t").await.unwrap_err();
    assert_eq!(err.precondition(), Some(MissingPrecondition::EmptyQuestion));

    let engineless = session_with(QaConfig::default(), Arc::new(LetterEmbedder::new()), None);
    engineless.ingest_documents(&[Document::new("a.txt", "some text")]).await;
    let err = engineless.ask("anything?").await.unwrap_err();
    assert_eq!(err.precondition(), Some(MissingPrecondition::EngineUnavailable));
}

#[tokio::test]
async fn engine_failures_are_reported_as_answer_engine_errors() {
    let engine = Arc::new(ScriptedEngine::failing("out of memory"));
    let session = session_with(QaConfig::default(), Arc::new(LetterEmbedder::new()), Some(engine));
    session.ingest_documents(&[Document::new("a.txt", "some text")]).await;

    let err = session.ask("what?").await.unwrap_err();
    match err {
        DocQaError::AnswerEngine { engine, message } => {
            assert_eq!(engine, "scripted");
            assert!(message.contains("out of memory"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn context_joins_top_chunks_in_rank_order() {
    let config = QaConfig::builder()
        .chunking_strategy(ChunkingStrategyKind::FixedWithoutOverlap)
        .chunk_size(10)
        .top_k(2)
        .build()
        .unwrap();
    let engine = Arc::new(ScriptedEngine::answering("zzz", 0.9));
    let session = session_with(config, Arc::new(LetterEmbedder::new()), Some(engine.clone()));
    let text = format!("{}{}y", "q".repeat(10), "z".repeat(19));
    session.ingest_documents(&[Document::new("mix.txt", text)]).await;

    let QueryOutcome::Answered(answered) = session.ask("zzzz").await.unwrap() else {
        panic!("expected an answer");
    };

    assert_eq!(answered.sources.len(), 2);
    assert_eq!(answered.sources[0].id, ChunkId::new("mix.txt", 1));
    assert_eq!(answered.sources[1].id, ChunkId::new("mix.txt", 2));
    assert_eq!(answered.context, "zzzzzzzzzz zzzzzzzzzy");
    assert_eq!(engine.requests()[0].context, answered.context);
    assert_eq!(engine.requests()[0].question, "zzzz");
}

#[tokio::test]
async fn degraded_vectors_rank_last_without_aborting() {
    let engine = Arc::new(ScriptedEngine::answering("alpha", 0.9));
    let session = session_with(QaConfig::default(), Arc::new(LetterEmbedder::new()), Some(engine));
    session.ingest_documents(&[Document::new("a.txt", "alpha beta")]).await;
    session
        .vector_store()
        .put(StoredChunk {
            id: ChunkId::new("legacy.txt", 0),
            embedding: vec![1.0, 2.0],
            text: "from an older model".into(),
            metadata: ChunkMetadata { document: "legacy.txt".into(), start: None, end: None },
        })
        .await
        .unwrap();

    let QueryOutcome::Answered(answered) = session.ask("alpha?").await.unwrap() else {
        panic!("expected an answer");
    };

    assert_eq!(answered.degraded, vec![ChunkId::new("legacy.txt", 0)]);
    assert_eq!(answered.sources.last().unwrap().id, ChunkId::new("legacy.txt", 0));
    assert!(answered.sources.last().unwrap().degraded);
    assert!(!answered.sources[0].degraded);
}

#[tokio::test]
async fn failed_chunk_embeddings_are_dropped_and_the_rest_stored() {
    let config = QaConfig::builder()
        .chunking_strategy(ChunkingStrategyKind::FixedWithoutOverlap)
        .chunk_size(10)
        .build()
        .unwrap();
    let embedder = Arc::new(LetterEmbedder::failing_on("FAIL_EMBED"));
    let session = session_with(config, embedder.clone(), None);

    let report = session
        .ingest_documents(&[Document::new("doc.txt", "aaaaaaaaaaFAIL_EMBEDbbbbbbbbbbZEROcccccc")])
        .await;

    assert!(report.failures.is_empty());
    let doc = &report.documents[0];
    assert_eq!(doc.stored, 2);
    let dropped: Vec<usize> = doc.dropped.iter().map(|d| d.index).collect();
    assert_eq!(dropped, vec![1, 3]);
    assert_eq!(report.dropped_chunks(), 2);
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 4);

    let ids: Vec<ChunkId> =
        session.vector_store().get_all().await.unwrap().into_iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![ChunkId::new("doc.txt", 0), ChunkId::new("doc.txt", 2)]);
}

#[tokio::test]
async fn stored_chunks_carry_offsets_for_fixed_strategies() {
    let config = QaConfig::builder().chunk_size(10).overlap(4).build().unwrap();
    let session = session_with(config, Arc::new(LetterEmbedder::new()), None);
    session.ingest_documents(&[Document::new("d.txt", "abcdefghijklmnopqrst")]).await;

    let chunk = session.vector_store().get(&ChunkId::new("d.txt", 1)).await.unwrap().unwrap();
    assert_eq!(chunk.text, "ghijklmnop");
    assert_eq!((chunk.metadata.start, chunk.metadata.end), (Some(6), Some(16)));
    assert_eq!(chunk.metadata.document, "d.txt");
}

#[tokio::test]
async fn one_bad_file_does_not_stop_the_batch() {
    let session = session_with(QaConfig::default(), Arc::new(LetterEmbedder::new()), None);
    let files = vec![
        SourceFile::new("good.txt", "First document."),
        SourceFile::new("slides.docx", vec![0x50, 0x4b, 0x03, 0x04]),
        SourceFile::new("blank.txt", "   \n"),
        SourceFile::new("notes.md", "Second document."),
    ];

    let report = session.ingest_files(&files).await;

    let names: Vec<&str> = report.documents.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["good.txt", "notes.md"]);
    let failed: Vec<&str> = report.failures.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(failed, vec!["slides.docx", "blank.txt"]);
    assert_eq!(report.stored_chunks(), 2);
    assert_eq!(session.chunk_count().await.unwrap(), 2);
}

#[tokio::test]
async fn reingesting_a_document_overwrites_its_chunks() {
    let session = session_with(QaConfig::default(), Arc::new(LetterEmbedder::new()), None);
    session.ingest_documents(&[Document::new("a.txt", "old text")]).await;
    session.ingest_documents(&[Document::new("a.txt", "new text")]).await;

    assert_eq!(session.chunk_count().await.unwrap(), 1);
    let chunk = session.vector_store().get(&ChunkId::new("a.txt", 0)).await.unwrap().unwrap();
    assert_eq!(chunk.text, "new text");
}

#[tokio::test]
async fn clear_resets_the_session() {
    let engine = Arc::new(ScriptedEngine::answering("text", 0.9));
    let session = session_with(QaConfig::default(), Arc::new(LetterEmbedder::new()), Some(engine));
    session.ingest_documents(&[Document::new("a.txt", "some text")]).await;
    session.ask("which text?").await.unwrap();
    assert_eq!(session.last_question().await.as_deref(), Some("which text?"));

    session.clear().await.unwrap();

    assert_eq!(session.chunk_count().await.unwrap(), 0);
    assert!(session.last_question().await.is_none());
    let err = session.ask("which text?").await.unwrap_err();
    assert_eq!(err.precondition(), Some(MissingPrecondition::NoStoredChunks));
}

#[test]
fn builder_requires_an_embedding_provider() {
    let err = QaSession::builder().build().unwrap_err();
    assert!(matches!(err, DocQaError::Config(_)));
}

/// Counts loads and fails for model names starting with `broken`.
#[derive(Default)]
struct CountingLoader {
    embedding_loads: AtomicUsize,
    engine_loads: AtomicUsize,
}

#[async_trait]
impl ModelLoader for CountingLoader {
    async fn load_embedding_provider(&self, name: &str) -> Result<Arc<dyn EmbeddingProvider>> {
        self.embedding_loads.fetch_add(1, Ordering::SeqCst);
        if name.starts_with("broken") {
            return Err(DocQaError::ModelLoad { model: name.into(), message: "not found".into() });
        }
        Ok(Arc::new(LetterEmbedder::new()))
    }

    async fn load_answer_engine(&self, name: &str) -> Result<Arc<dyn AnswerEngine>> {
        self.engine_loads.fetch_add(1, Ordering::SeqCst);
        if name.starts_with("broken") {
            return Err(DocQaError::ModelLoad { model: name.into(), message: "not found".into() });
        }
        Ok(Arc::new(ScriptedEngine::answering("text", 0.9)))
    }
}

#[tokio::test]
async fn sessions_are_isolated_and_share_models() {
    let loader = Arc::new(CountingLoader::default());
    let manager = SessionManager::new(loader.clone(), 4);

    let first = manager.create_session(QaConfig::default()).await.unwrap();
    let second = manager.create_session(QaConfig::default()).await.unwrap();
    assert_ne!(first.id(), second.id());
    assert_eq!(manager.len().await, 2);

    first.ingest_documents(&[Document::new("a.txt", "some text")]).await;
    assert_eq!(first.chunk_count().await.unwrap(), 1);
    assert_eq!(second.chunk_count().await.unwrap(), 0);

    assert_eq!(loader.embedding_loads.load(Ordering::SeqCst), 1);
    assert_eq!(loader.engine_loads.load(Ordering::SeqCst), 1);
    assert!(manager.answer_engines().contains("distilbert-base-cased-distilled-squad").await);

    let removed = manager.remove(first.id()).await.unwrap();
    assert_eq!(removed.id(), first.id());
    assert!(manager.get(first.id()).await.is_none());
    assert!(manager.get(second.id()).await.is_some());
}

#[tokio::test]
async fn engine_load_failure_still_creates_a_session() {
    let manager = SessionManager::new(Arc::new(CountingLoader::default()), 4);
    let config = QaConfig::builder().qa_model("broken/squad").build().unwrap();

    let session = manager.create_session(config).await.unwrap();
    assert!(!session.has_answer_engine());

    session.ingest_documents(&[Document::new("a.txt", "some text")]).await;
    let err = session.ask("what?").await.unwrap_err();
    assert_eq!(err.precondition(), Some(MissingPrecondition::EngineUnavailable));
}

#[tokio::test]
async fn embedding_load_failure_fails_session_creation() {
    let manager = SessionManager::new(Arc::new(CountingLoader::default()), 4);
    let config = QaConfig::builder().embedding_model("broken-embedder").build().unwrap();

    let err = manager.create_session(config).await.unwrap_err();
    assert!(matches!(err, DocQaError::ModelLoad { .. }));
    assert!(manager.is_empty().await);
}
