//! Domain types shared by the index, the router and the engine facade.

use serde::{Deserialize, Serialize};

/// A retrieved chunk together with its similarity to the query.
///
/// `score` is the inner product of two unit vectors, so it lies in [-1, 1];
/// higher is always more similar. `position` is the chunk's insertion index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub text: String,
    pub score: f32,
    pub position: usize,
}

/// Which generation branch a query took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Grounded,
    Fallback,
}

/// Label reported to callers for the origin of an answer.
///
/// `Faq` means the answer was grounded in indexed documents, `Ai` that the
/// model answered from general knowledge, `Error` that the run failed and a
/// canned apology was returned instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerSource {
    Faq,
    Ai,
    Error,
}

impl From<Route> for AnswerSource {
    fn from(route: Route) -> Self {
        match route {
            Route::Grounded => AnswerSource::Faq,
            Route::Fallback => AnswerSource::Ai,
        }
    }
}

impl AnswerSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerSource::Faq => "faq",
            AnswerSource::Ai => "ai",
            AnswerSource::Error => "error",
        }
    }
}

/// Terminal result of one `answer` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub answer: String,
    pub source: AnswerSource,
    pub confidence: f32,
    pub context_used: usize,
}

/// Read-only snapshot of engine state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStats {
    pub document_count: usize,
    pub embedding_model_id: String,
    pub generation_model_id: String,
}
