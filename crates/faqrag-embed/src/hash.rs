use std::hash::Hasher;

use async_trait::async_trait;
use twox_hash::XxHash64;

use faqrag_core::traits::Embedder;
use faqrag_core::Result;

/// Deterministic bag-of-words embedder.
///
/// Each lowercased alphanumeric token adds 1.0 to bucket `xxh64(token) % dim`;
/// the result is L2-normalized. Text with no alphanumeric token (`"???"`)
/// is hashed whole, so only blank text maps to the zero vector. Texts sharing
/// words score high, unrelated texts near zero. No model files, no network:
/// meant for tests and offline development.
pub struct HashEmbedder {
    dim: usize,
    model_id: String,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim, model_id: format!("hash:d{}", dim) }
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        let mut words: Vec<String> = tokens(text).collect();
        if words.is_empty() && !text.trim().is_empty() {
            words.push(text.trim().to_lowercase());
        }
        for token in &words {
            v[self.bucket(token)] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }

    fn bucket(&self, token: &str) -> usize {
        let mut hasher = XxHash64::with_seed(0);
        hasher.write(token.as_bytes());
        (hasher.finish() % self.dim as u64) as usize
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}
