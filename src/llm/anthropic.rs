//! Anthropic Messages API provider.
//!
//! Sends a single `POST /v1/messages` per completion and returns the first
//! text block of the answer.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{CompletionRequest, CompletionResponse, FinishReason, LlmConfig, LlmProvider};
use crate::error::LlmError;

/// Current Anthropic API version header value.
const API_VERSION: &str = "2023-06-01";

const PROVIDER: &str = "anthropic";

/// Vendor error bodies are logged, never returned; keep the log line short.
const MAX_ERROR_BODY_CHARS: usize = 300;

/// Anthropic LLM provider using the Messages API.
pub struct AnthropicProvider {
    client: Client,
    api_key: SecretString,
    api_base: String,
    model: String,
    timeout: Duration,
}

// -- Anthropic Messages API request/response types --

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ApiMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    input_tokens: u32,
    output_tokens: u32,
}

impl AnthropicProvider {
    /// Build a provider whose requests are bounded by `config.timeout`.
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            timeout: config.timeout,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.api_base)
    }

    fn map_transport_error(&self, e: reqwest::Error) -> LlmError {
        if e.is_timeout() {
            LlmError::Timeout {
                provider: PROVIDER.to_string(),
                timeout: self.timeout,
            }
        } else {
            LlmError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: e.to_string(),
            }
        }
    }

    fn parse_response(resp: MessagesResponse) -> Result<CompletionResponse, LlmError> {
        let content = resp
            .content
            .into_iter()
            .find_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .filter(|text| !text.is_empty())
            .ok_or_else(|| LlmError::InvalidResponse {
                provider: PROVIDER.to_string(),
                reason: "response contained no text content".to_string(),
            })?;

        let finish_reason = match resp.stop_reason.as_deref() {
            Some("end_turn") | Some("stop_sequence") => FinishReason::Stop,
            Some("max_tokens") => FinishReason::Length,
            _ => FinishReason::Unknown,
        };
        let (input_tokens, output_tokens) = resp
            .usage
            .map(|u| (u.input_tokens, u.output_tokens))
            .unwrap_or_default();

        Ok(CompletionResponse {
            content,
            input_tokens,
            output_tokens,
            finish_reason,
        })
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: request.max_tokens,
            messages: request
                .messages
                .iter()
                .map(|m| ApiMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
        };

        let resp = self
            .client
            .post(self.endpoint())
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = resp.status();
        if !status.is_success() {
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            let error_body = resp.text().await.unwrap_or_default();
            tracing::debug!(
                status = %status,
                body = %error_body.chars().take(MAX_ERROR_BODY_CHARS).collect::<String>(),
                "Anthropic returned an error"
            );

            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LlmError::AuthFailed {
                    provider: PROVIDER.to_string(),
                },
                StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimited {
                    provider: PROVIDER.to_string(),
                    retry_after,
                },
                _ => LlmError::RequestFailed {
                    provider: PROVIDER.to_string(),
                    reason: format!("HTTP {}", status),
                },
            });
        }

        let parsed: MessagesResponse = resp.json().await.map_err(|e| {
            if e.is_timeout() {
                self.map_transport_error(e)
            } else {
                LlmError::InvalidResponse {
                    provider: PROVIDER.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        let response = Self::parse_response(parsed)?;
        tracing::debug!(
            model = %self.model,
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            "Anthropic completion finished"
        );
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<CompletionResponse, LlmError> {
        let resp: MessagesResponse = serde_json::from_str(json).unwrap();
        AnthropicProvider::parse_response(resp)
    }

    #[test]
    fn parse_response_takes_first_text_block() {
        let resp = parse(
            r#"{
                "content": [
                    {"type": "text", "text": "first"},
                    {"type": "text", "text": "second"}
                ],
                "stop_reason": "end_turn",
                "usage": {"input_tokens": 12, "output_tokens": 3}
            }"#,
        )
        .unwrap();
        assert_eq!(resp.content, "first");
        assert_eq!(resp.finish_reason, FinishReason::Stop);
        assert_eq!(resp.input_tokens, 12);
        assert_eq!(resp.output_tokens, 3);
    }

    #[test]
    fn parse_response_skips_non_text_blocks() {
        let resp = parse(
            r#"{
                "content": [
                    {"type": "tool_use", "id": "t1", "name": "x", "input": {}},
                    {"type": "text", "text": "answer"}
                ],
                "stop_reason": "max_tokens"
            }"#,
        )
        .unwrap();
        assert_eq!(resp.content, "answer");
        assert_eq!(resp.finish_reason, FinishReason::Length);
    }

    #[test]
    fn parse_response_rejects_empty_content() {
        let err = parse(r#"{"content": []}"#).unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse { .. }));
    }

    #[test]
    fn parse_response_rejects_empty_text() {
        let err = parse(r#"{"content": [{"type": "text", "text": ""}]}"#).unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse { .. }));
    }

    #[test]
    fn request_body_matches_messages_api() {
        let body = MessagesRequest {
            model: "claude-3-sonnet-20240229",
            max_tokens: 500,
            messages: vec![ApiMessage {
                role: "user",
                content: "hi",
            }],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "claude-3-sonnet-20240229");
        assert_eq!(json["max_tokens"], 500);
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "hi");
    }

    #[test]
    fn endpoint_strips_trailing_slash() {
        let config = LlmConfig {
            api_key: SecretString::from("k"),
            api_base: "http://localhost:9000/".to_string(),
            model: "m".to_string(),
            timeout: Duration::from_secs(1),
        };
        let provider = AnthropicProvider::new(&config).unwrap();
        assert_eq!(provider.endpoint(), "http://localhost:9000/v1/messages");
    }
}
