//! Bot Framework activity payloads.
//!
//! Only the fields the bot reads or echoes back are modelled; everything else
//! in an inbound activity is ignored.

use serde::{Deserialize, Serialize};

use crate::error::ChannelError;

/// Activity type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActivityType {
    Message,
    ConversationUpdate,
    Typing,
    #[serde(other)]
    Unknown,
}

/// A user or bot account on a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelAccount {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// The conversation an activity belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationAccount {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_group: Option<bool>,
}

/// An inbound activity as POSTed to `/api/messages`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(rename = "type")]
    pub kind: ActivityType,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub service_url: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub from: Option<ChannelAccount>,
    #[serde(default)]
    pub recipient: Option<ChannelAccount>,
    #[serde(default)]
    pub conversation: Option<ConversationAccount>,
    #[serde(default)]
    pub members_added: Vec<ChannelAccount>,
}

impl Activity {
    /// Message text with surrounding whitespace removed (empty if absent).
    pub fn trimmed_text(&self) -> &str {
        self.text.as_deref().map(str::trim).unwrap_or_default()
    }

    /// Id of the bot this activity was addressed to.
    pub fn bot_id(&self) -> Option<&str> {
        self.recipient.as_ref().map(|r| r.id.as_str())
    }
}

/// Everything needed to send an activity back into a conversation.
#[derive(Debug, Clone)]
pub struct ConversationReference {
    pub service_url: String,
    pub channel_id: Option<String>,
    pub conversation: ConversationAccount,
    /// The bot's account; becomes `from` on replies.
    pub bot: Option<ChannelAccount>,
    /// The sender's account; becomes `recipient` on replies.
    pub user: Option<ChannelAccount>,
    /// Id of the inbound activity; replies thread under it.
    pub activity_id: Option<String>,
}

impl ConversationReference {
    pub fn from_activity(activity: &Activity) -> Result<Self, ChannelError> {
        let service_url = activity
            .service_url
            .clone()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ChannelError::InvalidMessage("activity has no serviceUrl".into()))?;
        let conversation = activity
            .conversation
            .clone()
            .ok_or_else(|| ChannelError::InvalidMessage("activity has no conversation".into()))?;

        Ok(Self {
            service_url,
            channel_id: activity.channel_id.clone(),
            conversation,
            bot: activity.recipient.clone(),
            user: activity.from.clone(),
            activity_id: activity.id.clone(),
        })
    }
}

/// An inbound user message. Lives for one request.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// Trimmed message text; may be empty.
    pub text: String,
    pub source: ConversationReference,
}

impl IncomingMessage {
    pub fn from_activity(activity: &Activity) -> Result<Self, ChannelError> {
        Ok(Self {
            text: activity.trimmed_text().to_string(),
            source: ConversationReference::from_activity(activity)?,
        })
    }
}

/// How outgoing text should be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Formatting {
    Plain,
    Card,
}

/// Text ready for delivery.
#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    pub text: String,
    pub formatting: Formatting,
}

impl OutgoingMessage {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            formatting: Formatting::Plain,
        }
    }

    pub fn card(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            formatting: Formatting::Card,
        }
    }
}

/// Something the bot sends into a conversation.
#[derive(Debug, Clone)]
pub enum OutgoingActivity {
    Typing,
    Message(OutgoingMessage),
}

impl OutgoingActivity {
    pub fn text(text: impl Into<String>) -> Self {
        OutgoingActivity::Message(OutgoingMessage::plain(text))
    }
}
