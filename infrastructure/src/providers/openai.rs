//! OpenAI Chat Completions adapter (`POST /v1/chat/completions`)
//!
//! Also works against OpenAI-compatible gateways by pointing `base_url`
//! at them.

use super::ProviderSettings;
use super::http::{read_json, send_error};
use async_trait::async_trait;
use consensus_application::{Completion, ProviderAdapter, ProviderError};
use consensus_domain::estimate::tokens_for_chars;
use consensus_domain::{Prompt, ProviderId};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

pub struct OpenAiAdapter {
    client: Client,
    settings: ProviderSettings,
}

impl OpenAiAdapter {
    pub fn new(client: Client, settings: ProviderSettings) -> Self {
        Self { client, settings }
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn id(&self) -> &ProviderId {
        &self.settings.id
    }

    async fn invoke(&self, prompt: &Prompt) -> Result<Completion, ProviderError> {
        let url = format!("{}/v1/chat/completions", self.settings.base_url);
        let request = ChatRequest {
            model: &self.settings.model,
            max_tokens: self.settings.max_tokens,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.settings.api_key)
            .json(&request)
            .send()
            .await
            .map_err(send_error)?;
        let body: ChatResponse = read_json(response).await?;

        let reported = body
            .usage
            .map(|u| u.prompt_tokens + u.completion_tokens);
        let text = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| ProviderError::InvalidResponse {
                message: "response has no message content".to_string(),
                tokens_used: reported.unwrap_or(0),
            })?;

        let tokens_used =
            reported.unwrap_or_else(|| tokens_for_chars(prompt.char_len() + text.chars().count()));
        debug!(provider = %self.settings.id, tokens = tokens_used, "OpenAI call finished");
        Ok(Completion::new(text, tokens_used))
    }
}
