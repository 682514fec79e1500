use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use faqrag_core::config::GenerationSettings;
use faqrag_core::traits::Generator;
use faqrag_core::Result;

use crate::{http_client, messages, non_empty, reachable, send_json, ChatMessage};

/// Chat completions from a running Ollama server (`POST /api/chat`).
pub struct OllamaGenerator {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    model_id: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: Option<OllamaChatMessage>,
}

#[derive(Debug, Deserialize)]
struct OllamaChatMessage {
    content: Option<String>,
}

impl OllamaGenerator {
    pub fn new(settings: &GenerationSettings) -> Result<Self> {
        Ok(Self {
            client: http_client(settings.timeout_secs)?,
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            model_id: format!("ollama:{}", settings.model),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        })
    }

    fn request<'a>(&'a self, system_prompt: &str, user_prompt: &str) -> OllamaChatRequest<'a> {
        OllamaChatRequest {
            model: &self.model,
            messages: messages(system_prompt, user_prompt),
            stream: false,
            options: OllamaOptions { temperature: self.temperature, num_predict: self.max_tokens },
        }
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn health_check(&self) -> bool {
        reachable(&self.client, &format!("{}/api/tags", self.endpoint)).await
    }

    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let url = format!("{}/api/chat", self.endpoint);
        let body = self.request(system_prompt, user_prompt);
        let response: OllamaChatResponse =
            send_json(self.client.post(&url).json(&body), "Ollama").await?;
        non_empty(response.message.and_then(|m| m.content), "Ollama")
    }
}
