//! Reply generation: ask the LLM once, fall back locally on any failure.

pub mod rules;

use std::sync::Arc;

use tracing::{info, warn};

use crate::llm::{CompletionRequest, LlmProvider, MAX_OUTPUT_TOKENS};

/// Reply sent by the relay when the AI call fails.
pub const STATIC_FAILURE_REPLY: &str = "Entschuldigung, ich konnte keine Antwort generieren.";

/// What to answer when the LLM is unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackPolicy {
    /// Keyword table with a generic echo reply (bot).
    Keywords,
    /// A fixed apology string (relay).
    Static,
}

/// Where a reply came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplySource {
    Ai,
    Fallback,
}

/// A generated reply. `text` is never empty.
#[derive(Debug, Clone)]
pub struct Reply {
    pub text: String,
    pub source: ReplySource,
}

impl Reply {
    pub fn is_fallback(&self) -> bool {
        self.source == ReplySource::Fallback
    }
}

/// Produces a reply for a user message.
///
/// With no provider configured the LLM is never contacted. Every provider
/// error degrades to fallback text; `generate` itself cannot fail.
pub struct ReplyGenerator {
    llm: Option<Arc<dyn LlmProvider>>,
    fallback: FallbackPolicy,
    max_tokens: u32,
}

impl ReplyGenerator {
    pub fn new(llm: Option<Arc<dyn LlmProvider>>, fallback: FallbackPolicy) -> Self {
        Self {
            llm,
            fallback,
            max_tokens: MAX_OUTPUT_TOKENS,
        }
    }

    pub fn is_ai_configured(&self) -> bool {
        self.llm.is_some()
    }

    /// Generate a reply for `message`.
    pub async fn generate(&self, message: &str) -> Reply {
        if let Some(llm) = &self.llm {
            let request = CompletionRequest::single_turn(message, self.max_tokens);
            match llm.complete(request).await {
                Ok(response) if !response.content.is_empty() => {
                    info!(
                        model = llm.model_name(),
                        output_tokens = response.output_tokens,
                        "AI reply generated"
                    );
                    return Reply {
                        text: response.content,
                        source: ReplySource::Ai,
                    };
                }
                Ok(_) => warn!("AI returned an empty reply, using fallback"),
                Err(e) => warn!(error = %e, "AI request failed, using fallback"),
            }
        }

        Reply {
            text: self.fallback_text(message),
            source: ReplySource::Fallback,
        }
    }

    fn fallback_text(&self, message: &str) -> String {
        match self.fallback {
            FallbackPolicy::Keywords => rules::canned_reply(message),
            FallbackPolicy::Static => STATIC_FAILURE_REPLY.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::error::LlmError;
    use crate::llm::{CompletionResponse, FinishReason};

    /// Stub provider that counts calls and returns a canned outcome.
    struct StubLlm {
        answer: Option<&'static str>,
        calls: AtomicUsize,
    }

    impl StubLlm {
        fn answering(answer: &'static str) -> Arc<Self> {
            Arc::new(Self {
                answer: Some(answer),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                answer: None,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for StubLlm {
        fn model_name(&self) -> &str {
            "stub"
        }

        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(request.messages.len(), 1);
            match self.answer {
                Some(text) => Ok(CompletionResponse {
                    content: text.to_string(),
                    input_tokens: 1,
                    output_tokens: 1,
                    finish_reason: FinishReason::Stop,
                }),
                None => Err(LlmError::Timeout {
                    provider: "stub".into(),
                    timeout: std::time::Duration::from_secs(30),
                }),
            }
        }
    }

    #[tokio::test]
    async fn returns_ai_text_verbatim() {
        let llm = StubLlm::answering("  Antwort mit Leerzeichen ");
        let generator = ReplyGenerator::new(
            Some(llm.clone() as Arc<dyn LlmProvider>),
            FallbackPolicy::Keywords,
        );
        let reply = generator.generate("frage").await;
        assert_eq!(reply.text, "  Antwort mit Leerzeichen ");
        assert_eq!(reply.source, ReplySource::Ai);
        assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn provider_error_uses_keyword_fallback() {
        let llm = StubLlm::failing();
        let generator = ReplyGenerator::new(
            Some(llm.clone() as Arc<dyn LlmProvider>),
            FallbackPolicy::Keywords,
        );
        let reply = generator.generate("hallo wie geht es dir").await;
        assert_eq!(reply.text, "Hallo! Wie kann ich Ihnen helfen?");
        assert!(reply.is_fallback());
        assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn provider_error_uses_static_fallback() {
        let generator = ReplyGenerator::new(
            Some(StubLlm::failing() as Arc<dyn LlmProvider>),
            FallbackPolicy::Static,
        );
        let reply = generator.generate("hallo").await;
        assert_eq!(reply.text, STATIC_FAILURE_REPLY);
        assert!(reply.is_fallback());
    }

    #[tokio::test]
    async fn empty_ai_answer_counts_as_failure() {
        let generator = ReplyGenerator::new(
            Some(StubLlm::answering("") as Arc<dyn LlmProvider>),
            FallbackPolicy::Static,
        );
        let reply = generator.generate("frage").await;
        assert_eq!(reply.text, STATIC_FAILURE_REPLY);
    }

    #[tokio::test]
    async fn without_provider_echoes_message() {
        let generator = ReplyGenerator::new(None, FallbackPolicy::Keywords);
        assert!(!generator.is_ai_configured());
        let reply = generator.generate("xyz123").await;
        assert!(reply.text.contains("xyz123"));
        assert!(reply.is_fallback());
    }

    #[tokio::test]
    async fn reply_is_never_empty() {
        let keywords = ReplyGenerator::new(None, FallbackPolicy::Keywords);
        let fixed = ReplyGenerator::new(
            Some(StubLlm::failing() as Arc<dyn LlmProvider>),
            FallbackPolicy::Static,
        );
        for input in ["a", "hi", "?", "wer bist du", "ümlaut"] {
            assert!(!keywords.generate(input).await.text.is_empty());
            assert!(!fixed.generate(input).await.text.is_empty());
        }
    }
}
