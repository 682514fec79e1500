use std::sync::Arc;
use std::time::Duration;

use faqrag_core::config::Settings;
use faqrag_core::traits::Generator;
use faqrag_core::types::{Answer, AnswerSource, EngineStats, Route};
use faqrag_core::{Error, Result};
use faqrag_vector::{IndexOptions, VectorIndex};

use crate::api::HealthReport;
use crate::prompts;
use crate::router::{RetrievalGradingRouter, RouterConfig};

/// Owns the index and the generator; the one long-lived object a host
/// constructs at startup and shares with its request handlers.
pub struct Engine {
    index: Arc<VectorIndex>,
    generator: Arc<dyn Generator>,
    router: RetrievalGradingRouter,
}

impl Engine {
    pub fn new(index: VectorIndex, generator: Arc<dyn Generator>, settings: &Settings) -> Self {
        let index = Arc::new(index);
        let router = RetrievalGradingRouter::new(
            Arc::clone(&index),
            Arc::clone(&generator),
            settings.persona.clone(),
            RouterConfig {
                top_k: settings.retrieval.top_k,
                similarity_threshold: settings.retrieval.similarity_threshold,
                generation_timeout: Duration::from_secs(settings.generation.timeout_secs),
            },
        );
        Self { index, generator, router }
    }

    /// Build every adapter from configuration and restore the persisted index.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        settings.validate()?;
        let embedder = faqrag_embed::build_embedder(&settings.embedding)?;
        let generator = faqrag_generate::build_generator(&settings.generation)?;
        let index = VectorIndex::open(
            embedder,
            IndexOptions {
                dir: settings.storage.resolved_index_dir(),
                embed_timeout: Duration::from_secs(settings.embedding.timeout_secs),
                batch_size: settings.embedding.batch_size,
            },
        );
        Ok(Self::new(index, generator, settings))
    }

    /// Add `chunks` as one atomic batch. Blank chunks are skipped; returns the
    /// number actually indexed. Re-ingesting a text adds a duplicate entry.
    pub async fn ingest(&self, chunks: &[String]) -> Result<usize> {
        let kept: Vec<String> = chunks.iter().filter(|c| !c.trim().is_empty()).cloned().collect();
        if kept.len() < chunks.len() {
            tracing::warn!(skipped = chunks.len() - kept.len(), "skipping blank chunks");
        }
        if kept.is_empty() {
            return Ok(0);
        }
        self.index.append(&kept).await
    }

    /// Ingest `chunks` only when the index holds no documents.
    pub async fn seed_if_empty(&self, chunks: &[String]) -> Result<usize> {
        let size = self.index.size();
        if size > 0 {
            tracing::info!(documents = size, "index already populated, not seeding");
            return Ok(0);
        }
        self.ingest(chunks).await
    }

    /// Answer one question.
    ///
    /// `Err` only for a blank query. Infrastructure failures are logged and
    /// turned into an `AnswerSource::Error` answer carrying a generic apology.
    pub async fn answer(&self, query: &str) -> Result<Answer> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::InvalidInput("query is empty".to_string()));
        }

        match self.router.run(query).await {
            Ok(state) => Ok(Answer {
                answer: state.answer_text,
                source: AnswerSource::from(state.route.unwrap_or(Route::Fallback)),
                confidence: state.top_score,
                context_used: state.context_count,
            }),
            Err(failure) => {
                tracing::error!(kind = failure.kind.as_str(), stage = ?failure.stage, error = %failure.message, "answer failed");
                Ok(Answer {
                    answer: prompts::apology(self.router.persona()),
                    source: AnswerSource::Error,
                    confidence: 0.0,
                    context_used: 0,
                })
            }
        }
    }

    /// The index is usable from construction on, so readiness is the
    /// generator's reachability.
    pub async fn is_ready(&self) -> bool {
        self.generator.health_check().await
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            document_count: self.index.size(),
            embedding_model_id: self.index.embedding_model_id().to_string(),
            generation_model_id: self.generator.model_id().to_string(),
        }
    }

    pub async fn health(&self) -> HealthReport {
        let ready = self.is_ready().await;
        HealthReport::new(ready, self.stats())
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn router(&self) -> &RetrievalGradingRouter {
        &self.router
    }
}
