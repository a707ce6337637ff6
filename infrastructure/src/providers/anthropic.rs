//! Anthropic Messages API adapter (`POST /v1/messages`)

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
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: [Message<'a>; 1],
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

pub struct AnthropicAdapter {
    client: Client,
    settings: ProviderSettings,
}

impl AnthropicAdapter {
    pub fn new(client: Client, settings: ProviderSettings) -> Self {
        Self { client, settings }
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn id(&self) -> &ProviderId {
        &self.settings.id
    }

    async fn invoke(&self, prompt: &Prompt) -> Result<Completion, ProviderError> {
        let url = format!("{}/v1/messages", self.settings.base_url);
        let request = MessagesRequest {
            model: &self.settings.model,
            max_tokens: self.settings.max_tokens,
            system: &prompt.system,
            messages: [Message {
                role: "user",
                content: &prompt.user,
            }],
        };

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.settings.api_key)
            .header("anthropic-version", &self.settings.api_version)
            .json(&request)
            .send()
            .await
            .map_err(send_error)?;
        let body: MessagesResponse = read_json(response).await?;

        let text: String = body
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let reported = body.usage.map(|u| u.input_tokens + u.output_tokens);
        if text.trim().is_empty() {
            return Err(ProviderError::InvalidResponse {
                message: "response has no text content".to_string(),
                tokens_used: reported.unwrap_or(0),
            });
        }

        let tokens_used =
            reported.unwrap_or_else(|| tokens_for_chars(prompt.char_len() + text.chars().count()));
        debug!(provider = %self.settings.id, tokens = tokens_used, "Anthropic call finished");
        Ok(Completion::new(text, tokens_used))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderKind;
    use crate::providers::http::build_client;
    use httpmock::prelude::*;
    use serde_json::json;

    fn adapter(base_url: String) -> AnthropicAdapter {
        AnthropicAdapter::new(
            build_client().unwrap(),
            ProviderSettings {
                id: ProviderId::new("claude").unwrap(),
                kind: ProviderKind::Anthropic,
                model: "claude-sonnet-4-5".to_string(),
                base_url,
                api_key: "sk-ant-test".to_string(),
                max_tokens: 1024,
                api_version: "2023-06-01".to_string(),
            },
        )
    }

    #[tokio::test]
    async fn test_invoke_sends_messages_request() {
        let server = MockServer::start_async().await;
        let messages = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/messages")
                    .header("x-api-key", "sk-ant-test")
                    .header("anthropic-version", "2023-06-01")
                    .json_body_partial(
                        json!({"model": "claude-sonnet-4-5", "system": "You draft."}).to_string(),
                    )
                    .body_contains("Topic: tides");
                then.status(200).json_body(json!({
                    "content": [{"type": "text", "text": "Draft body"}],
                    "usage": {"input_tokens": 120, "output_tokens": 80}
                }));
            })
            .await;

        let completion = adapter(server.base_url())
            .invoke(&Prompt::new("You draft.", "Topic: tides"))
            .await
            .unwrap();
        assert_eq!(completion.text, "Draft body");
        assert_eq!(completion.tokens_used, 200);
        messages.assert_async().await;
    }

    #[tokio::test]
    async fn test_rate_limit_maps_to_rate_limited() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/messages");
                then.status(429)
                    .json_body(json!({"error": {"type": "rate_limit_error"}}));
            })
            .await;
        let err = adapter(server.base_url())
            .invoke(&Prompt::new("s", "u"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::RateLimited(_)));
    }

    #[tokio::test]
    async fn test_empty_content_is_invalid() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/messages");
                then.status(200).json_body(json!({"content": [], "usage": null}));
            })
            .await;
        let err = adapter(server.base_url())
            .invoke(&Prompt::new("s", "u"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProviderError::InvalidResponse { tokens_used: 0, .. }
        ));
    }

    #[tokio::test]
    async fn test_blank_text_still_reports_billed_usage() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/messages");
                then.status(200).json_body(json!({
                    "content": [{"type": "text", "text": "   "}],
                    "usage": {"input_tokens": 900, "output_tokens": 40}
                }));
            })
            .await;
        let err = adapter(server.base_url())
            .invoke(&Prompt::new("s", "u"))
            .await
            .unwrap_err();
        assert_eq!(err.tokens_used(), 940);
        assert!(matches!(err, ProviderError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn test_missing_usage_falls_back_to_estimate() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/messages");
                then.status(200)
                    .json_body(json!({"content": [{"type": "text", "text": "abcd"}]}));
            })
            .await;
        let completion = adapter(server.base_url())
            .invoke(&Prompt::new("ss", "uu"))
            .await
            .unwrap();
        assert_eq!(completion.tokens_used, 2);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        let err = adapter("http://127.0.0.1:1".to_string())
            .invoke(&Prompt::new("s", "u"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::TransportError(_)));
    }
}
