//! Embedder adapters.
//!
//! - [`BertEmbedder`]: local sentence-transformer weights run with candle
//! - [`OllamaEmbedder`]: remote Ollama `/api/embed`
//! - [`HashEmbedder`]: deterministic feature hashing for tests and dev
//!
//! `APP_USE_FAKE_EMBEDDINGS=1` forces the hashing embedder regardless of the
//! configured backend.

use std::sync::Arc;

use faqrag_core::config::{EmbedderBackend, EmbeddingSettings};
use faqrag_core::traits::Embedder;
use faqrag_core::Result;

mod bert;
mod device;
mod hash;
mod ollama;
mod pool;
mod tokenize;

pub use bert::BertEmbedder;
pub use hash::HashEmbedder;
pub use ollama::OllamaEmbedder;
pub use pool::masked_mean_l2;

pub fn build_embedder(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>> {
    if use_fake_embeddings() {
        tracing::info!(dim = settings.dimension, "using HashEmbedder (APP_USE_FAKE_EMBEDDINGS)");
        return Ok(Arc::new(HashEmbedder::new(settings.dimension)));
    }
    let embedder: Arc<dyn Embedder> = match settings.backend {
        EmbedderBackend::Local => Arc::new(BertEmbedder::load(settings)?),
        EmbedderBackend::Ollama => Arc::new(OllamaEmbedder::new(settings)?),
        EmbedderBackend::Hash => Arc::new(HashEmbedder::new(settings.dimension)),
    };
    tracing::info!(model = embedder.model_id(), dim = embedder.dim(), "embedder ready");
    Ok(embedder)
}

fn use_fake_embeddings() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}
