use async_trait::async_trait;

use crate::error::Result;

/// Text → fixed-length vector capability.
///
/// Implementations must return one vector per input, in input order, each of
/// length `dim()`, and must be deterministic for a given model version.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Stable identifier for the model (stored in index snapshots).
    fn model_id(&self) -> &str;
    fn dim(&self) -> usize;
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// (system prompt, user prompt) → text capability.
#[async_trait]
pub trait Generator: Send + Sync {
    fn model_id(&self) -> &str;
    /// Whether the backend is reachable. Never errors; unreachable is `false`.
    async fn health_check(&self) -> bool;
    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;
}
