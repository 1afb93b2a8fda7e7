//! Teams incoming-webhook delivery.
//!
//! Card-formatted messages are posted as a legacy `MessageCard`; plain ones
//! as a bare `{"text": ...}` payload.

use std::time::Duration;

use serde::Serialize;

use super::activity::{Formatting, OutgoingMessage};
use crate::error::ChannelError;

const CHANNEL_NAME: &str = "teams-webhook";

/// Bound on a single webhook POST.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

pub const CARD_TITLE: &str = "🤖 Claude Bot";
pub const CARD_SUBTITLE: &str = "AI Assistent";
pub const CARD_SUMMARY: &str = "Claude Bot Antwort";
pub const CARD_IMAGE: &str = "https://cdn-icons-png.flaticon.com/512/4712/4712027.png";
pub const CARD_THEME_COLOR: &str = "0078D4";

/// Legacy Office 365 connector card.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageCard {
    #[serde(rename = "@type")]
    pub card_type: &'static str,
    #[serde(rename = "@context")]
    pub context: &'static str,
    pub summary: String,
    pub theme_color: String,
    pub sections: Vec<CardSection>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardSection {
    pub activity_title: String,
    pub activity_subtitle: String,
    pub activity_image: String,
    pub text: String,
    pub markdown: bool,
}

impl MessageCard {
    /// The relay's standard card around `text`.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            card_type: "MessageCard",
            context: "https://schema.org/extensions",
            summary: CARD_SUMMARY.to_string(),
            theme_color: CARD_THEME_COLOR.to_string(),
            sections: vec![CardSection {
                activity_title: CARD_TITLE.to_string(),
                activity_subtitle: CARD_SUBTITLE.to_string(),
                activity_image: CARD_IMAGE.to_string(),
                text: text.into(),
                markdown: true,
            }],
        }
    }
}

/// Markdown body of a relay card: the question followed by the answer.
pub fn question_answer_text(question: &str, answer: &str) -> String {
    format!("**Frage:** {}\n\n**Claude:** {}", question, answer)
}

/// Result of a delivery attempt that did not error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// No webhook URL configured.
    Skipped,
}

/// Posts messages to a Teams incoming webhook.
pub struct WebhookClient {
    client: reqwest::Client,
    url: Option<String>,
    timeout: Duration,
}

impl WebhookClient {
    pub fn new(url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.url.is_some()
    }

    /// Deliver `message`. Exactly one POST when a URL is configured, none otherwise.
    pub async fn deliver(&self, message: &OutgoingMessage) -> Result<Delivery, ChannelError> {
        let Some(url) = &self.url else {
            tracing::warn!("Teams webhook URL not configured, skipping delivery");
            return Ok(Delivery::Skipped);
        };

        let request = self.client.post(url).timeout(self.timeout);
        let request = match message.formatting {
            Formatting::Card => request.json(&MessageCard::new(&message.text)),
            Formatting::Plain => request.json(&serde_json::json!({ "text": message.text })),
        };

        let resp = request.send().await.map_err(|e| ChannelError::SendFailed {
            name: CHANNEL_NAME.into(),
            reason: e.to_string(),
        })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let err = resp.text().await.unwrap_or_default();
            return Err(ChannelError::SendFailed {
                name: CHANNEL_NAME.into(),
                reason: format!("webhook returned {}: {}", status, err),
            });
        }

        tracing::info!("Message delivered to Teams webhook");
        Ok(Delivery::Delivered)
    }
}
