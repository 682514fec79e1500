use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use faqrag_core::config::EmbeddingSettings;
use faqrag_core::traits::Embedder;
use faqrag_core::{Error, Result};

/// Embeddings from a running Ollama server (`POST /api/embed`).
pub struct OllamaEmbedder {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    model_id: String,
    dim: usize,
}

#[derive(Debug, Serialize)]
struct OllamaEmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct OllamaEmbeddingResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbedder {
    pub fn new(settings: &EmbeddingSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            model_id: format!("ollama:{}", settings.model),
            dim: settings.dimension,
        })
    }

    fn check_response(&self, expected: usize, embeddings: &[Vec<f32>]) -> Result<()> {
        if embeddings.len() != expected {
            return Err(Error::Embedding(format!(
                "Ollama returned {} embeddings for {} inputs",
                embeddings.len(),
                expected
            )));
        }
        if let Some(bad) = embeddings.iter().find(|v| v.len() != self.dim) {
            return Err(Error::Embedding(format!(
                "Ollama returned dimension {}, expected {}",
                bad.len(),
                self.dim
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/api/embed", self.endpoint);
        let request = OllamaEmbeddingRequest { model: &self.model, input: texts };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(Error::embedding)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Embedding(format!("Ollama API error {status}: {body}")));
        }

        let result: OllamaEmbeddingResponse = response.json().await.map_err(Error::embedding)?;
        self.check_response(texts.len(), &result.embeddings)?;
        Ok(result.embeddings)
    }
}
