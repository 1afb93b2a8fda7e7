//! Conversational bot: answers each message in the conversation it came from.
//!
//! [`BotHandler`] holds the turn logic; [`routes`] adapts it to the
//! `/api/messages` endpoint. Replies leave through an [`ActivitySender`], so
//! the handler never talks HTTP itself.

pub mod routes;

pub use routes::{app, bot_routes};

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::channels::{
    Activity, ActivitySender, ActivityType, ChannelAccount, ConversationReference,
    IncomingMessage, OutgoingActivity,
};
use crate::error::ChannelError;
use crate::responder::ReplyGenerator;

/// Sent when a message activity carries no text.
pub const EMPTY_MESSAGE_PROMPT: &str = "Bitte senden Sie eine Textnachricht.";

/// Sent to every member added to a conversation (except the bot itself).
pub const WELCOME_TEXT: &str = "🤖 Hallo! Ich bin Ihr Claude-Bot.\n\n\
    Schreiben Sie mir einfach eine Nachricht und ich antworte Ihnen mit KI-Power!\n\n\
    💡 Tipp: Stellen Sie mir Fragen, bitten Sie um Hilfe oder führen Sie einfach ein Gespräch.";

/// Sent when a turn fails unexpectedly.
pub const TURN_ERROR_REPLY: &str =
    "Entschuldigung, etwas ist schiefgelaufen. Bitte versuchen Sie es erneut.";

/// Turn logic of the bot.
pub struct BotHandler {
    generator: ReplyGenerator,
    sender: Arc<dyn ActivitySender>,
}

impl BotHandler {
    pub fn new(generator: ReplyGenerator, sender: Arc<dyn ActivitySender>) -> Self {
        Self { generator, sender }
    }

    pub fn generator(&self) -> &ReplyGenerator {
        &self.generator
    }

    /// Dispatch one inbound activity to the matching hook.
    ///
    /// Activity types without a hook are acknowledged and ignored.
    pub async fn on_turn(&self, activity: &Activity) -> Result<(), ChannelError> {
        match activity.kind {
            ActivityType::Message => {
                let message = IncomingMessage::from_activity(activity)?;
                self.on_message(&message).await
            }
            ActivityType::ConversationUpdate if !activity.members_added.is_empty() => {
                let reference = ConversationReference::from_activity(activity)?;
                self.on_members_added(&reference, &activity.members_added, activity.bot_id())
                    .await
            }
            kind => {
                debug!(?kind, "Ignoring activity");
                Ok(())
            }
        }
    }

    /// Answer a user message.
    ///
    /// Only a failure to send the empty-message prompt is returned; a failed
    /// typing indicator or reply is logged and the turn still succeeds.
    pub async fn on_message(&self, message: &IncomingMessage) -> Result<(), ChannelError> {
        let reference = &message.source;

        if message.text.is_empty() {
            debug!("Empty message, prompting for text");
            return self
                .sender
                .send(reference, OutgoingActivity::text(EMPTY_MESSAGE_PROMPT))
                .await;
        }

        info!(
            conversation = %reference.conversation.id,
            chars = message.text.chars().count(),
            "Message received"
        );

        if let Err(e) = self.sender.send(reference, OutgoingActivity::Typing).await {
            warn!(error = %e, "Typing indicator failed");
        }

        let reply = self.generator.generate(&message.text).await;
        let fallback = reply.is_fallback();

        match self
            .sender
            .send(reference, OutgoingActivity::text(reply.text))
            .await
        {
            Ok(()) => info!(fallback, "Reply sent"),
            Err(e) => warn!(error = %e, "Failed to send reply"),
        }

        Ok(())
    }

    /// Welcome every added member other than the bot.
    pub async fn on_members_added(
        &self,
        reference: &ConversationReference,
        members: &[ChannelAccount],
        bot_id: Option<&str>,
    ) -> Result<(), ChannelError> {
        for member in members {
            if bot_id == Some(member.id.as_str()) {
                continue;
            }
            debug!(member = %member.id, "Welcoming new member");
            self.sender
                .send(reference, OutgoingActivity::text(WELCOME_TEXT))
                .await?;
        }
        Ok(())
    }

    /// Log a failed turn and tell the user, if we know where they are.
    pub async fn on_turn_error(
        &self,
        reference: Option<&ConversationReference>,
        err: &ChannelError,
    ) {
        error!(error = %err, "Turn failed");

        let Some(reference) = reference else {
            return;
        };
        if let Err(send_err) = self
            .sender
            .send(reference, OutgoingActivity::text(TURN_ERROR_REPLY))
            .await
        {
            error!(error = %send_err, "Failed to send turn error message");
        }
    }
}
