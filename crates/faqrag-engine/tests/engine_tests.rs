use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use faqrag_core::config::{EmbedderBackend, Settings};
use faqrag_core::traits::{Embedder, Generator};
use faqrag_core::types::AnswerSource;
use faqrag_core::{Error, Result};
use faqrag_embed::HashEmbedder;
use faqrag_engine::api::{self, ChatRequest};
use faqrag_engine::Engine;
use faqrag_vector::{IndexOptions, VectorIndex};

const DEPOSIT: &str = "Minimum deposit is 10,000.";
const UPI: &str = "Cards support UPI payments.";

/// Replies with a fixed text and records every (system, user) pair.
struct RecordingGenerator {
    reply: String,
    calls: Mutex<Vec<(String, String)>>,
}

impl RecordingGenerator {
    fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self { reply: reply.to_string(), calls: Mutex::new(Vec::new()) })
    }

    fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generator for RecordingGenerator {
    fn model_id(&self) -> &str {
        "recording"
    }

    async fn health_check(&self) -> bool {
        true
    }

    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        self.calls.lock().unwrap().push((system_prompt.to_string(), user_prompt.to_string()));
        Ok(self.reply.clone())
    }
}

struct FailingGenerator;

#[async_trait]
impl Generator for FailingGenerator {
    fn model_id(&self) -> &str {
        "failing"
    }

    async fn health_check(&self) -> bool {
        false
    }

    async fn generate(&self, _: &str, _: &str) -> Result<String> {
        Err(Error::Generation("connection refused to 10.0.0.7:11434".to_string()))
    }
}

struct SlowGenerator;

#[async_trait]
impl Generator for SlowGenerator {
    fn model_id(&self) -> &str {
        "slow"
    }

    async fn health_check(&self) -> bool {
        true
    }

    async fn generate(&self, _: &str, _: &str) -> Result<String> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok("too late".to_string())
    }
}

/// Hashing embedder that counts calls and can be switched to failing or stalling.
struct SwitchableEmbedder {
    inner: HashEmbedder,
    calls: AtomicUsize,
    failing: AtomicBool,
    stalled: AtomicBool,
}

impl SwitchableEmbedder {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: HashEmbedder::new(384),
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            stalled: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl Embedder for SwitchableEmbedder {
    fn model_id(&self) -> &str {
        self.inner.model_id()
    }

    fn dim(&self) -> usize {
        self.inner.dim()
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Embedding("model server gone".to_string()));
        }
        if self.stalled.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(5)).await;
        }
        self.inner.embed_batch(texts).await
    }
}

fn settings() -> Settings {
    let mut s = Settings::default();
    s.embedding.backend = EmbedderBackend::Hash;
    s.generation.timeout_secs = 1;
    s.embedding.timeout_secs = 1;
    s
}

fn engine(dir: &Path, embedder: Arc<dyn Embedder>, generator: Arc<dyn Generator>, settings: &Settings) -> Engine {
    let index = VectorIndex::open(
        embedder,
        IndexOptions {
            dir: dir.to_path_buf(),
            embed_timeout: Duration::from_secs(settings.embedding.timeout_secs),
            batch_size: settings.embedding.batch_size,
        },
    );
    Engine::new(index, generator, settings)
}

fn hash_engine(dir: &Path, generator: Arc<dyn Generator>) -> Engine {
    engine(dir, Arc::new(HashEmbedder::new(384)), generator, &settings())
}

fn texts(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn deposit_question_is_grounded() {
    let tmp = tempfile::tempdir().unwrap();
    let generator = RecordingGenerator::new("You need at least 10,000.");
    let engine = hash_engine(tmp.path(), generator.clone());
    engine.ingest(&texts(&[DEPOSIT, UPI])).await.unwrap();

    let hits = engine.index().search("what is the minimum deposit", 3).await.unwrap();
    assert_eq!(hits[0].text, DEPOSIT);

    let answer = engine.answer("what is the minimum deposit").await.unwrap();
    assert_eq!(answer.source, AnswerSource::Faq);
    assert_eq!(answer.answer, "You need at least 10,000.");
    assert!(answer.context_used >= 1);
    assert!((answer.confidence - hits[0].score).abs() < 1e-6);

    let calls = generator.calls();
    assert_eq!(calls.len(), 1);
    let (system, user) = &calls[0];
    assert_eq!(user, "what is the minimum deposit");
    assert!(system.contains(&format!("Context:\n{}", DEPOSIT)), "best chunk comes first in the context");
}

#[tokio::test]
async fn unrelated_question_falls_back_with_zero_confidence() {
    let tmp = tempfile::tempdir().unwrap();
    let generator = RecordingGenerator::new("I can't check the weather.");
    let engine = hash_engine(tmp.path(), generator.clone());
    engine.ingest(&texts(&[DEPOSIT, UPI])).await.unwrap();

    let top = engine.index().search("what is the weather today", 1).await.unwrap()[0].score;
    assert!(top < 0.3);

    let answer = engine.answer("what is the weather today").await.unwrap();
    assert_eq!(answer.source, AnswerSource::Ai);
    assert_eq!(answer.confidence, 0.0);
    assert_eq!(answer.context_used, 0);

    let (system, _) = &generator.calls()[0];
    assert!(system.contains("No specific context was found"));
    assert!(!system.contains(DEPOSIT) && !system.contains(UPI), "rejected candidates never reach the prompt");
}

#[tokio::test]
async fn empty_index_falls_back() {
    let tmp = tempfile::tempdir().unwrap();
    let engine = hash_engine(tmp.path(), RecordingGenerator::new("We are open 9 to 5."));

    let answer = engine.answer("What are your hours?").await.unwrap();
    assert_eq!(answer.source, AnswerSource::Ai);
    assert_eq!(answer.context_used, 0);
    assert_eq!(answer.confidence, 0.0);
}

#[tokio::test]
async fn threshold_is_exclusive_at_the_boundary() {
    let tmp = tempfile::tempdir().unwrap();
    let query = "what is the minimum deposit";
    let score = {
        let first = hash_engine(tmp.path(), RecordingGenerator::new("x"));
        first.ingest(&texts(&[DEPOSIT])).await.unwrap();
        first.index().search(query, 1).await.unwrap()[0].score
    };

    let mut at = settings();
    at.retrieval.similarity_threshold = score;
    let engine_at = engine(tmp.path(), Arc::new(HashEmbedder::new(384)), RecordingGenerator::new("x"), &at);
    assert_eq!(engine_at.stats().document_count, 1);
    assert_eq!(engine_at.answer(query).await.unwrap().source, AnswerSource::Ai);

    let mut below = settings();
    below.retrieval.similarity_threshold = score - 1e-4;
    let engine_below = engine(tmp.path(), Arc::new(HashEmbedder::new(384)), RecordingGenerator::new("x"), &below);
    let answer = engine_below.answer(query).await.unwrap();
    assert_eq!(answer.source, AnswerSource::Faq);
    assert_eq!(answer.context_used, 1);
}

#[tokio::test]
async fn blank_query_touches_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let embedder = SwitchableEmbedder::new();
    let generator = RecordingGenerator::new("x");
    let engine = engine(tmp.path(), embedder.clone(), generator.clone(), &settings());
    engine.ingest(&texts(&[DEPOSIT])).await.unwrap();
    let embeds_before = embedder.calls.load(Ordering::SeqCst);

    for q in ["", "   ", "\n\t"] {
        assert!(matches!(engine.answer(q).await, Err(Error::InvalidInput(_))));
    }
    assert_eq!(embedder.calls.load(Ordering::SeqCst), embeds_before);
    assert!(generator.calls().is_empty());
}

#[tokio::test]
async fn generator_failure_becomes_error_answer() {
    let tmp = tempfile::tempdir().unwrap();
    let engine = hash_engine(tmp.path(), Arc::new(FailingGenerator));
    engine.ingest(&texts(&[DEPOSIT, UPI])).await.unwrap();

    let answer = engine.answer("what is the minimum deposit").await.unwrap();
    assert_eq!(answer.source, AnswerSource::Error);
    assert_eq!(answer.confidence, 0.0);
    assert_eq!(answer.context_used, 0);
    assert!(!answer.answer.contains("10.0.0.7"), "no internal detail leaks to the user");
    assert!(answer.answer.contains("Novio support"));
}

#[tokio::test]
async fn slow_generator_times_out_into_error_answer() {
    let tmp = tempfile::tempdir().unwrap();
    let engine = hash_engine(tmp.path(), Arc::new(SlowGenerator));

    let answer = engine.answer("What are your hours?").await.unwrap();
    assert_eq!(answer.source, AnswerSource::Error);
    assert_eq!(answer.context_used, 0);
}

#[tokio::test]
async fn embedding_failure_aborts_before_generation() {
    let tmp = tempfile::tempdir().unwrap();
    let embedder = SwitchableEmbedder::new();
    let generator = RecordingGenerator::new("x");
    let engine = engine(tmp.path(), embedder.clone(), generator.clone(), &settings());
    engine.ingest(&texts(&[DEPOSIT])).await.unwrap();

    embedder.failing.store(true, Ordering::SeqCst);
    let answer = engine.answer("what is the minimum deposit").await.unwrap();
    assert_eq!(answer.source, AnswerSource::Error);
    assert!(generator.calls().is_empty());
}

#[tokio::test]
async fn stalled_query_embedding_becomes_error_answer() {
    let tmp = tempfile::tempdir().unwrap();
    let embedder = SwitchableEmbedder::new();
    let generator = RecordingGenerator::new("x");
    let engine = engine(tmp.path(), embedder.clone(), generator.clone(), &settings());
    engine.ingest(&texts(&[DEPOSIT, UPI])).await.unwrap();

    embedder.stalled.store(true, Ordering::SeqCst);
    let answer = engine.answer("what is the minimum deposit").await.unwrap();
    assert_eq!(answer.source, AnswerSource::Error);
    assert_eq!(answer.context_used, 0);
    assert!(generator.calls().is_empty(), "generation never starts without retrieval");
}

#[tokio::test]
async fn stalled_ingest_embedding_leaves_index_unchanged() {
    let tmp = tempfile::tempdir().unwrap();
    let embedder = SwitchableEmbedder::new();
    let engine = engine(tmp.path(), embedder.clone(), RecordingGenerator::new("x"), &settings());
    engine.ingest(&texts(&[DEPOSIT])).await.unwrap();

    embedder.stalled.store(true, Ordering::SeqCst);
    assert!(matches!(engine.ingest(&texts(&[UPI])).await, Err(Error::Embedding(_))));
    assert_eq!(engine.stats().document_count, 1);
}

#[tokio::test]
async fn symbol_only_question_falls_back_instead_of_erroring() {
    let tmp = tempfile::tempdir().unwrap();
    let generator = RecordingGenerator::new("Could you rephrase that?");
    let engine = hash_engine(tmp.path(), generator.clone());
    engine.ingest(&texts(&[DEPOSIT, UPI])).await.unwrap();

    let answer = engine.answer("???").await.unwrap();
    assert_eq!(answer.source, AnswerSource::Ai);
    assert_eq!(answer.confidence, 0.0);
    assert_eq!(answer.answer, "Could you rephrase that?");
    assert_eq!(generator.calls().len(), 1);
}

#[tokio::test]
async fn symbol_only_chunk_is_ingested() {
    let tmp = tempfile::tempdir().unwrap();
    let engine = hash_engine(tmp.path(), RecordingGenerator::new("x"));

    assert_eq!(engine.ingest(&texts(&["Fees", "\u{2014}"])).await.unwrap(), 2);
    assert_eq!(engine.stats().document_count, 2);
}

#[tokio::test]
async fn failed_ingest_leaves_index_unchanged() {
    let tmp = tempfile::tempdir().unwrap();
    let embedder = SwitchableEmbedder::new();
    let engine = engine(tmp.path(), embedder.clone(), RecordingGenerator::new("x"), &settings());
    engine.ingest(&texts(&[DEPOSIT])).await.unwrap();

    embedder.failing.store(true, Ordering::SeqCst);
    assert!(matches!(engine.ingest(&texts(&[UPI])).await, Err(Error::Embedding(_))));
    assert_eq!(engine.stats().document_count, 1);
}

#[tokio::test]
async fn ingest_counts_only_non_blank_chunks() {
    let tmp = tempfile::tempdir().unwrap();
    let engine = hash_engine(tmp.path(), RecordingGenerator::new("x"));

    assert_eq!(engine.ingest(&[]).await.unwrap(), 0);
    assert_eq!(engine.ingest(&texts(&[DEPOSIT, "  ", UPI, ""])).await.unwrap(), 2);
    assert_eq!(engine.ingest(&texts(&["   "])).await.unwrap(), 0);
    assert_eq!(engine.stats().document_count, 2);

    // no deduplication
    engine.ingest(&texts(&[DEPOSIT])).await.unwrap();
    assert_eq!(engine.stats().document_count, 3);
}

#[tokio::test]
async fn seed_only_when_empty() {
    let tmp = tempfile::tempdir().unwrap();
    let engine = hash_engine(tmp.path(), RecordingGenerator::new("x"));

    assert_eq!(engine.seed_if_empty(&texts(&[DEPOSIT, UPI])).await.unwrap(), 2);
    assert_eq!(engine.seed_if_empty(&texts(&[DEPOSIT, UPI])).await.unwrap(), 0);
    assert_eq!(engine.stats().document_count, 2);
}

#[tokio::test]
async fn from_settings_restores_on_start() {
    let tmp = tempfile::tempdir().unwrap();
    let mut s = settings();
    s.storage.index_dir = tmp.path().join("index").to_string_lossy().into_owned();

    {
        let engine = Engine::from_settings(&s).unwrap();
        assert!(!engine.index().restored());
        engine.ingest(&texts(&[DEPOSIT, UPI])).await.unwrap();
    }

    let engine = Engine::from_settings(&s).unwrap();
    assert!(engine.index().restored());
    let stats = engine.stats();
    assert_eq!(stats.document_count, 2);
    assert_eq!(stats.embedding_model_id, "hash:d384");
    assert_eq!(stats.generation_model_id, "ollama:gpt-oss:20b-cloud");
}

#[tokio::test]
async fn health_reports_generator_reachability() {
    let tmp = tempfile::tempdir().unwrap();
    let healthy = hash_engine(tmp.path(), RecordingGenerator::new("x"));
    healthy.ingest(&texts(&[DEPOSIT])).await.unwrap();
    let report = healthy.health().await;
    assert!(report.ready);
    assert_eq!(report.documents_indexed, 1);
    assert_eq!(report.generation_model, "recording");

    let other = tempfile::tempdir().unwrap();
    let down = hash_engine(other.path(), Arc::new(FailingGenerator));
    assert!(!down.is_ready().await);
    assert!(!down.health().await.ready);
}

#[tokio::test]
async fn chat_contract() {
    let tmp = tempfile::tempdir().unwrap();
    let engine = hash_engine(tmp.path(), RecordingGenerator::new("Ten thousand."));
    engine.ingest(&texts(&[DEPOSIT, UPI])).await.unwrap();

    let resp = api::chat(&engine, ChatRequest { message: "  what is the minimum deposit  ".to_string() })
        .await
        .unwrap();
    assert_eq!(resp.source, AnswerSource::Faq);
    assert!((0.0..=1.0).contains(&resp.confidence));

    let empty = api::chat(&engine, ChatRequest { message: "   ".to_string() }).await;
    assert!(matches!(empty, Err(Error::InvalidInput(_))));

    let stats = api::stats(&engine);
    assert_eq!(stats.documents_indexed, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_answers_during_ingest() {
    let tmp = tempfile::tempdir().unwrap();
    let engine = Arc::new(hash_engine(tmp.path(), RecordingGenerator::new("ok")));
    engine.ingest(&texts(&[DEPOSIT])).await.unwrap();

    let writer = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            for i in 0..5 {
                engine.ingest(&[format!("extra fact number {i}")]).await.unwrap();
            }
        })
    };
    let readers: Vec<_> = (0..8)
        .map(|_| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.answer("what is the minimum deposit").await.unwrap() })
        })
        .collect();

    writer.await.unwrap();
    for r in readers {
        assert_eq!(r.await.unwrap().source, AnswerSource::Faq);
    }
    assert_eq!(engine.stats().document_count, 6);
}
