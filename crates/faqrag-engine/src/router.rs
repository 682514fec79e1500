//! Retrieve → grade → generate, as an explicit state machine.
//!
//! ```text
//! Start → Retrieved → Graded → Grounded ─┐
//!                           └─→ Fallback ─┴→ Done
//! ```
//!
//! Every run starts from a fresh [`QueryState`], visits each stage at most
//! once and either reaches `Done` or stops with a [`GenerationFailure`].

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::Instrument;

use faqrag_core::config::PersonaSettings;
use faqrag_core::traits::Generator;
use faqrag_core::types::{Route, ScoredChunk};
use faqrag_vector::VectorIndex;

use crate::prompts;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Start,
    Retrieved,
    Graded,
    Grounded,
    Fallback,
    Done,
}

/// Working state of one query.
#[derive(Debug, Clone)]
pub struct QueryState {
    pub query: String,
    /// Descending by score. Emptied when the run falls back.
    pub candidates: Vec<ScoredChunk>,
    /// Score of the first candidate; 0.0 when there is none or the run fell back.
    pub top_score: f32,
    pub route: Option<Route>,
    pub answer_text: String,
    pub context_count: usize,
    pub stage: Stage,
}

impl QueryState {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            candidates: Vec::new(),
            top_score: 0.0,
            route: None,
            answer_text: String::new(),
            context_count: 0,
            stage: Stage::Start,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    RetrievalError,
    GenerationError,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::RetrievalError => "retrieval_error",
            FailureKind::GenerationError => "generation_error",
        }
    }
}

/// A run that stopped before `Done`. `stage` is the last stage reached.
#[derive(Debug, Clone, thiserror::Error, Serialize)]
#[error("{} after stage {stage:?}: {message}", .kind.as_str())]
pub struct GenerationFailure {
    pub kind: FailureKind,
    pub stage: Stage,
    pub message: String,
}

impl GenerationFailure {
    fn new(kind: FailureKind, stage: Stage, err: impl std::fmt::Display) -> Self {
        Self { kind, stage, message: err.to_string() }
    }
}

#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub top_k: usize,
    /// Exclusive lower bound on the top score for a grounded answer.
    pub similarity_threshold: f32,
    pub generation_timeout: Duration,
}

/// The grading rule: grounded only when there is a candidate and the best
/// score is strictly above `threshold`.
pub fn grade(candidates: &[ScoredChunk], top_score: f32, threshold: f32) -> Route {
    if !candidates.is_empty() && top_score > threshold {
        Route::Grounded
    } else {
        Route::Fallback
    }
}

pub struct RetrievalGradingRouter {
    index: Arc<VectorIndex>,
    generator: Arc<dyn Generator>,
    persona: PersonaSettings,
    config: RouterConfig,
}

impl RetrievalGradingRouter {
    pub fn new(
        index: Arc<VectorIndex>,
        generator: Arc<dyn Generator>,
        persona: PersonaSettings,
        config: RouterConfig,
    ) -> Self {
        Self { index, generator, persona, config }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn persona(&self) -> &PersonaSettings {
        &self.persona
    }

    /// Run one query to `Done`. The caller is expected to have rejected blank
    /// queries already.
    pub async fn run(&self, query: &str) -> Result<QueryState, GenerationFailure> {
        let span = tracing::info_span!("answer", query_chars = query.chars().count());
        async move {
            let mut state = QueryState::new(query);
            self.retrieve(&mut state).await?;
            self.apply_grade(&mut state);
            self.generate(&mut state).await?;
            state.stage = Stage::Done;
            Ok(state)
        }
        .instrument(span)
        .await
    }

    async fn retrieve(&self, state: &mut QueryState) -> Result<(), GenerationFailure> {
        let stage = state.stage;
        let candidates = self
            .index
            .search(&state.query, self.config.top_k)
            .await
            .map_err(|e| GenerationFailure::new(FailureKind::RetrievalError, stage, e))?;

        state.top_score = candidates.first().map(|c| c.score).unwrap_or(0.0);
        state.candidates = candidates;
        state.stage = Stage::Retrieved;
        tracing::debug!(retrieved = state.candidates.len(), top_score = state.top_score, "retrieved");
        Ok(())
    }

    fn apply_grade(&self, state: &mut QueryState) {
        let route = grade(&state.candidates, state.top_score, self.config.similarity_threshold);
        if route == Route::Fallback {
            state.candidates.clear();
        }
        state.route = Some(route);
        state.stage = Stage::Graded;
        tracing::info!(
            ?route,
            top_score = state.top_score,
            threshold = self.config.similarity_threshold,
            "graded"
        );
    }

    async fn generate(&self, state: &mut QueryState) -> Result<(), GenerationFailure> {
        let system_prompt = match state.route {
            Some(Route::Grounded) => {
                state.stage = Stage::Grounded;
                state.context_count = state.candidates.len();
                let context = state
                    .candidates
                    .iter()
                    .map(|c| c.text.as_str())
                    .collect::<Vec<_>>()
                    .join("\n\n");
                prompts::grounded(&self.persona, &context)
            }
            _ => {
                state.stage = Stage::Fallback;
                state.context_count = 0;
                state.top_score = 0.0;
                prompts::fallback(&self.persona)
            }
        };

        let stage = state.stage;
        let timeout = self.config.generation_timeout;
        let generated = tokio::time::timeout(timeout, self.generator.generate(&system_prompt, &state.query))
            .await
            .map_err(|_| {
                GenerationFailure::new(
                    FailureKind::GenerationError,
                    stage,
                    format!("generation timed out after {:?}", timeout),
                )
            })?
            .map_err(|e| GenerationFailure::new(FailureKind::GenerationError, stage, e))?;

        state.answer_text = generated;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(score: f32) -> ScoredChunk {
        ScoredChunk { text: "t".to_string(), score, position: 0 }
    }

    #[test]
    fn threshold_is_exclusive() {
        assert_eq!(grade(&[chunk(0.3)], 0.3, 0.3), Route::Fallback);
        assert_eq!(grade(&[chunk(0.3001)], 0.3001, 0.3), Route::Grounded);
    }

    #[test]
    fn no_candidates_always_falls_back() {
        assert_eq!(grade(&[], 0.9, 0.3), Route::Fallback);
        assert_eq!(grade(&[], 0.0, -1.0), Route::Fallback);
    }

    #[test]
    fn negative_threshold_admits_low_scores() {
        assert_eq!(grade(&[chunk(-0.2)], -0.2, -0.5), Route::Grounded);
    }

    #[test]
    fn failure_serializes_snake_case() {
        let f = GenerationFailure::new(FailureKind::RetrievalError, Stage::Start, "boom");
        let v = serde_json::to_value(&f).unwrap();
        assert_eq!(v["kind"], "retrieval_error");
        assert_eq!(v["stage"], "start");
        assert_eq!(f.to_string(), "retrieval_error after stage Start: boom");
    }

    #[test]
    fn fresh_state_starts_unrouted() {
        let s = QueryState::new("q");
        assert_eq!(s.stage, Stage::Start);
        assert!(s.route.is_none());
        assert_eq!(s.top_score, 0.0);
    }
}
