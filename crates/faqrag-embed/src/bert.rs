use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::Tokenizer;

use faqrag_core::config::{resolve_with_base, EmbeddingSettings};
use faqrag_core::traits::Embedder;
use faqrag_core::{Error, Result};

use crate::device::select_device;
use crate::pool::masked_mean_l2;
use crate::tokenize::tokenize_batch;

/// Sentence-transformer BERT (e.g. all-MiniLM-L6-v2) run in-process.
pub struct BertEmbedder {
    inner: Arc<BertInner>,
    model_id: String,
    dim: usize,
}

struct BertInner {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    max_len: usize,
}

impl BertEmbedder {
    pub fn load(settings: &EmbeddingSettings) -> Result<Self> {
        let model_dir = resolve_model_dir(settings)?;
        tracing::info!(model = %settings.model, dir = %model_dir.display(), "loading embedding model");
        let device = select_device();

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(|e| {
            Error::InvalidConfig(format!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))
        })?;

        let config_path = model_dir.join("config.json");
        let raw_config = std::fs::read_to_string(&config_path)
            .map_err(|e| Error::InvalidConfig(format!("{}: {}", config_path.display(), e)))?;
        let config: BertConfig = serde_json::from_str(&raw_config)
            .map_err(|e| Error::InvalidConfig(format!("{}: {}", config_path.display(), e)))?;
        let hidden_size = serde_json::from_str::<serde_json::Value>(&raw_config)
            .ok()
            .and_then(|v| v["hidden_size"].as_u64())
            .map(|h| h as usize)
            .ok_or_else(|| Error::InvalidConfig("model config has no hidden_size".to_string()))?;
        if hidden_size != settings.dimension {
            return Err(Error::InvalidConfig(format!(
                "embedding.dimension is {} but model {} produces {}",
                settings.dimension, settings.model, hidden_size
            )));
        }

        let weights = load_weights(&model_dir, &device)?;
        let vb = VarBuilder::from_tensors(weights, DType::F32, &device);
        let model = BertModel::load(vb, &config).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        tracing::info!(model = %settings.model, dim = hidden_size, "embedding model loaded");

        Ok(Self {
            inner: Arc::new(BertInner { model, tokenizer, device, max_len: settings.max_len }),
            model_id: format!("local:{}", settings.model),
            dim: hidden_size,
        })
    }
}

impl BertInner {
    fn embed_sync(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let start = Instant::now();
        let batch = tokenize_batch(&self.tokenizer, texts, self.max_len, &self.device)?;
        let hidden = self
            .model
            .forward(&batch.input_ids, &batch.token_type_ids, Some(&batch.attention_mask))
            .map_err(Error::embedding)?;
        let pooled = masked_mean_l2(&hidden, &batch.attention_mask).map_err(Error::embedding)?;
        let vectors: Vec<Vec<f32>> = pooled
            .to_device(&Device::Cpu)
            .and_then(|t| t.to_vec2())
            .map_err(Error::embedding)?;
        tracing::debug!(batch = texts.len(), elapsed_ms = start.elapsed().as_millis() as u64, "embedded batch");
        Ok(vectors)
    }
}

#[async_trait]
impl Embedder for BertEmbedder {
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
        let inner = Arc::clone(&self.inner);
        let texts = texts.to_vec();
        tokio::task::spawn_blocking(move || inner.embed_sync(&texts))
            .await
            .map_err(|e| Error::Embedding(format!("embedding task failed: {}", e)))?
    }
}

fn load_weights(model_dir: &Path, device: &Device) -> Result<HashMap<String, Tensor>> {
    let safetensors = model_dir.join("model.safetensors");
    if safetensors.exists() {
        return candle_core::safetensors::load(&safetensors, device)
            .map_err(|e| Error::InvalidConfig(format!("{}: {}", safetensors.display(), e)));
    }
    let pickle = model_dir.join("pytorch_model.bin");
    let tensors = candle_core::pickle::read_all(&pickle)
        .map_err(|e| Error::InvalidConfig(format!("{}: {}", pickle.display(), e)))?;
    tensors
        .into_iter()
        .map(|(name, t)| t.to_device(device).map(|t| (name, t)))
        .collect::<candle_core::Result<HashMap<_, _>>>()
        .map_err(|e| Error::InvalidConfig(e.to_string()))
}

fn resolve_model_dir(settings: &EmbeddingSettings) -> Result<PathBuf> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Some(dir) = &settings.model_dir {
        candidates.push(resolve_with_base(&cwd, dir));
    }
    for var in ["APP_MODEL_DIR", "MODEL_DIR"] {
        if let Ok(dir) = std::env::var(var) {
            candidates.push(resolve_with_base(&cwd, dir));
        }
    }
    candidates.push(cwd.join("models").join(&settings.model));
    candidates.push(cwd.join("../models").join(&settings.model));

    candidates
        .into_iter()
        .find(|p| p.join("tokenizer.json").exists())
        .ok_or_else(|| {
            Error::InvalidConfig(format!(
                "Could not locate model directory for {} (set embedding.model_dir or APP_MODEL_DIR)",
                settings.model
            ))
        })
}
