use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use faqrag_core::config::GenerationSettings;
use faqrag_core::traits::Generator;
use faqrag_core::Result;

use crate::{http_client, messages, non_empty, reachable, send_json, ChatMessage};

/// Any server implementing the OpenAI chat completions API (LM Studio,
/// llama.cpp server, vLLM). `endpoint` is the base URL without `/v1`.
pub struct OpenAiCompatGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
    model_id: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl CompletionResponse {
    fn into_content(self) -> Option<String> {
        self.choices.into_iter().next().and_then(|c| c.message).and_then(|m| m.content)
    }
}

impl OpenAiCompatGenerator {
    pub fn new(settings: &GenerationSettings) -> Result<Self> {
        Ok(Self {
            client: http_client(settings.timeout_secs)?,
            base_url: settings.endpoint.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            model_id: format!("openai:{}", settings.model),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        })
    }

    fn request<'a>(&'a self, system_prompt: &str, user_prompt: &str) -> CompletionRequest<'a> {
        CompletionRequest {
            model: &self.model,
            messages: messages(system_prompt, user_prompt),
            stream: false,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

#[async_trait]
impl Generator for OpenAiCompatGenerator {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn health_check(&self) -> bool {
        reachable(&self.client, &format!("{}/v1/models", self.base_url)).await
    }

    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = self.request(system_prompt, user_prompt);
        let response: CompletionResponse =
            send_json(self.client.post(&url).json(&body), "chat completions").await?;
        non_empty(response.into_content(), "chat completions")
    }
}
