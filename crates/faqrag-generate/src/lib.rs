//! Generator adapters.
//!
//! - [`OllamaGenerator`]: Ollama `/api/chat`
//! - [`OpenAiCompatGenerator`]: any `/v1/chat/completions` server

use std::sync::Arc;
use std::time::Duration;

use faqrag_core::config::{GenerationSettings, GeneratorBackend};
use faqrag_core::traits::Generator;
use faqrag_core::{Error, Result};
use serde::{Deserialize, Serialize};

mod ollama;
mod openai;

pub use ollama::OllamaGenerator;
pub use openai::OpenAiCompatGenerator;

pub fn build_generator(settings: &GenerationSettings) -> Result<Arc<dyn Generator>> {
    let generator: Arc<dyn Generator> = match settings.backend {
        GeneratorBackend::Ollama => Arc::new(OllamaGenerator::new(settings)?),
        GeneratorBackend::OpenAi => Arc::new(OpenAiCompatGenerator::new(settings)?),
    };
    tracing::info!(model = generator.model_id(), endpoint = %settings.endpoint, "generator ready");
    Ok(generator)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// The system/user pair every generation call sends.
pub(crate) fn messages(system_prompt: &str, user_prompt: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage { role: "system".to_string(), content: system_prompt.to_string() },
        ChatMessage { role: "user".to_string(), content: user_prompt.to_string() },
    ]
}

pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Error::InvalidConfig(e.to_string()))
}

/// Treat a missing or whitespace-only completion as a failed generation.
pub(crate) fn non_empty(content: Option<String>, backend: &str) -> Result<String> {
    match content {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(Error::Generation(format!("{backend} returned an empty completion"))),
    }
}

/// Send `request` and decode a 2xx JSON body, mapping every failure to
/// `Error::Generation`.
pub(crate) async fn send_json<T>(request: reqwest::RequestBuilder, backend: &str) -> Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            Error::Generation(format!("{backend} request timed out"))
        } else {
            Error::Generation(format!("{backend} unreachable: {e}"))
        }
    })?;
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Generation(format!("{backend} API error {status}: {body}")));
    }
    response.json().await.map_err(Error::generation)
}

/// GET `url` and report whether it answered 2xx.
pub(crate) async fn reachable(client: &reqwest::Client, url: &str) -> bool {
    match client.get(url).send().await {
        Ok(resp) => resp.status().is_success(),
        Err(e) => {
            tracing::debug!(url, error = %e, "generator health check failed");
            false
        }
    }
}
