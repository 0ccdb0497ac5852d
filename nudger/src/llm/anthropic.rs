//! Anthropic API client implementation
//!
//! Implements the LlmClient trait for the Anthropic Messages API.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::http::post_json;
use super::{CompletionRequest, CompletionResponse, LlmClient, LlmError, StopReason, TokenUsage};
use crate::config::LlmConfig;

/// Anthropic API client
pub struct AnthropicClient {
    model: String,
    api_key: String,
    base_url: String,
    http: Client,
    max_tokens: u32,
    temperature: f32,
    timeout: Duration,
}

impl AnthropicClient {
    /// Create a new client from configuration
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        debug!(model = %config.model, "from_config: called");
        let api_key = config.api_key().map_err(|e| LlmError::NotConfigured(e.to_string()))?;

        let timeout = config.timeout();
        let http = Client::builder().timeout(timeout).build().map_err(LlmError::Network)?;

        Ok(Self {
            model: config.model.clone(),
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            timeout,
        })
    }

    fn build_request_body(&self, request: &CompletionRequest) -> serde_json::Value {
        debug!(%self.model, %request.max_tokens, "build_request_body: called");
        let messages: Vec<serde_json::Value> = request
            .messages
            .iter()
            .map(|m| {
                serde_json::json!({
                    "role": m.role.as_str(),
                    "content": m.content,
                })
            })
            .collect();

        serde_json::json!({
            "model": self.model,
            "max_tokens": request.max_tokens.min(self.max_tokens),
            "system": request.system_prompt,
            "messages": messages,
            "temperature": request.temperature.unwrap_or(self.temperature),
        })
    }

    fn parse_response(&self, api_response: AnthropicResponse) -> CompletionResponse {
        debug!(stop_reason = %api_response.stop_reason, "parse_response: called");
        let text: Vec<String> = api_response
            .content
            .into_iter()
            .filter(|b| b.kind == "text")
            .filter_map(|b| b.text)
            .collect();

        CompletionResponse {
            content: if text.is_empty() { None } else { Some(text.join("")) },
            stop_reason: StopReason::from_anthropic(&api_response.stop_reason),
            usage: TokenUsage {
                input_tokens: api_response.usage.input_tokens,
                output_tokens: api_response.usage.output_tokens,
            },
        }
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        debug!(%self.model, %request.max_tokens, "complete: called");
        let url = format!("{}/v1/messages", self.base_url);
        let body = self.build_request_body(&request);

        let response = post_json(&self.http, &url, &body, self.timeout, |rb| {
            rb.header("x-api-key", self.api_key.clone())
                .header("anthropic-version", "2023-06-01")
        })
        .await?;

        let api_response: AnthropicResponse = response.json().await?;
        Ok(self.parse_response(api_response))
    }
}

// API response types

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
    stop_reason: String,
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
struct AnthropicContentBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u64,
    output_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Message;

    fn client() -> AnthropicClient {
        AnthropicClient {
            model: "claude-haiku".to_string(),
            api_key: "test-key".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            http: Client::new(),
            max_tokens: 500,
            temperature: 0.7,
            timeout: Duration::from_secs(30),
        }
    }

    #[test]
    fn test_build_request_body_puts_system_at_top_level() {
        let request = CompletionRequest {
            system_prompt: "Be kind".to_string(),
            messages: vec![Message::user("hello")],
            max_tokens: 2000,
            temperature: None,
        };
        let body = client().build_request_body(&request);

        assert_eq!(body["system"], "Be kind");
        assert_eq!(body["max_tokens"], 500);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_parse_response_joins_text_blocks() {
        let json = r#"{
            "content": [{"type": "text", "text": "Hello "}, {"type": "text", "text": "there"}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 10, "output_tokens": 2}
        }"#;
        let api: AnthropicResponse = serde_json::from_str(json).unwrap();
        let resp = client().parse_response(api);
        assert_eq!(resp.content.as_deref(), Some("Hello there"));
        assert_eq!(resp.stop_reason, StopReason::EndTurn);
    }
}
