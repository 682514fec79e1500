//! Request/response shapes for a host exposing the engine over HTTP or
//! another transport: `/chat`, `/health` and `/stats`.

use serde::{Deserialize, Serialize};

use faqrag_core::types::{Answer, AnswerSource, EngineStats};
use faqrag_core::Result;

use crate::Engine;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub answer: String,
    pub source: AnswerSource,
    /// Always within [0, 1]; 0.0 on fallback and error.
    pub confidence: f32,
    pub context_used: usize,
}

impl From<Answer> for ChatResponse {
    fn from(a: Answer) -> Self {
        Self {
            answer: a.answer,
            source: a.source,
            confidence: clamp_confidence(a.confidence),
            context_used: a.context_used,
        }
    }
}

fn clamp_confidence(score: f32) -> f32 {
    if score.is_finite() { score.clamp(0.0, 1.0) } else { 0.0 }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub ready: bool,
    pub documents_indexed: usize,
    pub embedding_model: String,
    pub generation_model: String,
}

impl HealthReport {
    pub fn new(ready: bool, stats: EngineStats) -> Self {
        let StatsReport { documents_indexed, embedding_model, generation_model } = stats.into();
        Self { ready, documents_indexed, embedding_model, generation_model }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsReport {
    pub documents_indexed: usize,
    pub embedding_model: String,
    pub generation_model: String,
}

impl From<EngineStats> for StatsReport {
    fn from(s: EngineStats) -> Self {
        Self {
            documents_indexed: s.document_count,
            embedding_model: s.embedding_model_id,
            generation_model: s.generation_model_id,
        }
    }
}

/// `/chat`: an empty message is `Error::InvalidInput`; everything else yields
/// a response, with `source = "error"` when the backends failed.
pub async fn chat(engine: &Engine, request: ChatRequest) -> Result<ChatResponse> {
    let answer = engine.answer(request.message.trim()).await?;
    Ok(answer.into())
}

pub fn stats(engine: &Engine) -> StatsReport {
    engine.stats().into()
}
