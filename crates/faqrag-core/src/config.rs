//! Layered configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (nested keys separated by `__`, e.g.
//! `APP_RETRIEVAL__TOP_K=5`). Provides helpers to expand `~` and `${VAR}` and to
//! resolve relative paths against a known base directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Self::defaults().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Self::env_provider());

        let config = Self { figment };
        config.settings()?;
        Ok(config)
    }

    /// Load a single explicit config file (plus `APP_*` overrides).
    pub fn load_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::InvalidConfig(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        let figment = Self::defaults()
            .merge(Toml::file(path))
            .merge(Self::env_provider());
        let config = Self { figment };
        config.settings()?;
        Ok(config)
    }

    /// Defaults overlaid with an inline TOML document. No files, no env.
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let config = Self { figment: Self::defaults().merge(Toml::string(toml)) };
        config.settings()?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{}': {}", key, e)))
    }

    /// The fully merged, validated settings tree.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    fn defaults() -> Figment {
        Figment::from(Serialized::defaults(Settings::default()))
    }

    fn env_provider() -> Env {
        Env::prefixed("APP_").split("__")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub embedding: EmbeddingSettings,
    pub generation: GenerationSettings,
    pub retrieval: RetrievalSettings,
    pub storage: StorageSettings,
    pub persona: PersonaSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderBackend {
    /// Sentence-transformer weights run in-process with candle.
    Local,
    /// Remote Ollama `/api/embed`.
    Ollama,
    /// Deterministic feature hashing; no model needed.
    Hash,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub backend: EmbedderBackend,
    pub model: String,
    pub model_dir: Option<String>,
    pub dimension: usize,
    pub max_len: usize,
    pub endpoint: String,
    pub batch_size: usize,
    pub timeout_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            backend: EmbedderBackend::Local,
            model: "all-MiniLM-L6-v2".to_string(),
            model_dir: None,
            dimension: 384,
            max_len: 256,
            endpoint: "http://localhost:11434".to_string(),
            batch_size: 32,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorBackend {
    Ollama,
    /// Any server speaking `/v1/chat/completions` (LM Studio, llama.cpp, vLLM).
    OpenAi,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub backend: GeneratorBackend,
    pub model: String,
    pub endpoint: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub timeout_secs: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            backend: GeneratorBackend::Ollama,
            model: "gpt-oss:20b-cloud".to_string(),
            endpoint: "http://localhost:11434".to_string(),
            temperature: 0.7,
            max_tokens: None,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub top_k: usize,
    /// Exclusive: a candidate must score strictly above this to ground an answer.
    pub similarity_threshold: f32,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { top_k: 3, similarity_threshold: 0.3 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub index_dir: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self { index_dir: "data/index".to_string() }
    }
}

impl StorageSettings {
    /// `index_dir` with `~`/env vars expanded, relative to the working directory.
    pub fn resolved_index_dir(&self) -> PathBuf {
        let base = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        resolve_with_base(&base, &self.index_dir)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonaSettings {
    pub company_name: String,
    pub legal_entity: String,
    pub description: String,
}

impl Default for PersonaSettings {
    fn default() -> Self {
        Self {
            company_name: "Novio".to_string(),
            legal_entity: "Credilio Financial Technologies Pvt. Ltd.".to_string(),
            description: "a fintech platform offering FD-backed RuPay credit cards in India"
                .to_string(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(Error::InvalidConfig(msg.to_string()));

        if self.retrieval.top_k == 0 {
            return invalid("retrieval.top_k must be at least 1");
        }
        let threshold = self.retrieval.similarity_threshold;
        if !threshold.is_finite() || !(-1.0..=1.0).contains(&threshold) {
            return invalid("retrieval.similarity_threshold must be a finite value in [-1, 1]");
        }
        if self.embedding.dimension == 0 {
            return invalid("embedding.dimension must be positive");
        }
        if self.embedding.batch_size == 0 {
            return invalid("embedding.batch_size must be positive");
        }
        if self.embedding.max_len == 0 {
            return invalid("embedding.max_len must be positive");
        }
        if self.embedding.timeout_secs == 0 || self.generation.timeout_secs == 0 {
            return invalid("timeouts must be at least one second");
        }
        if self.embedding.model.trim().is_empty() || self.generation.model.trim().is_empty() {
            return invalid("model identifiers must not be empty");
        }
        if self.storage.index_dir.trim().is_empty() {
            return invalid("storage.index_dir must not be empty");
        }
        Ok(())
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
