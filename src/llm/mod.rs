//! LLM integration.
//!
//! The services only ever send one user turn and read back one text answer,
//! so the provider surface is a single `complete` call. Anthropic's Messages
//! API is the only backend.

mod anthropic;

pub use anthropic::AnthropicProvider;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::LlmError;

/// Model used when `CLAUDE_MODEL` is not set.
pub const DEFAULT_MODEL: &str = "claude-3-sonnet-20240229";

/// Default Anthropic API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.anthropic.com";

/// Upper bound on generated tokens per reply.
pub const MAX_OUTPUT_TOKENS: u32 = 500;

/// Timeout for a single completion request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Role of a chat message. Requests are single-turn, so only the user speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
        }
    }
}

/// A single chat message.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
}

impl CompletionRequest {
    /// Request with `text` as the sole user turn.
    pub fn single_turn(text: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            messages: vec![ChatMessage::user(text)],
            max_tokens,
        }
    }
}

/// Why generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    Unknown,
}

/// A completion response.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// First text segment of the response.
    pub content: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub finish_reason: FinishReason,
}

/// An LLM backend capable of answering a completion request.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn model_name(&self) -> &str;

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;
}

/// Configuration for creating an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: secrecy::SecretString,
    pub api_base: String,
    pub model: String,
    pub timeout: Duration,
}

/// Create an LLM provider from configuration.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    let provider = AnthropicProvider::new(config)?;
    tracing::info!(model = %config.model, "Using Anthropic");
    Ok(Arc::new(provider))
}
