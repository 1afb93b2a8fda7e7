//! Channel I/O: Bot Framework activities and the Teams webhook.

pub mod activity;
pub mod connector;
pub mod webhook;

pub use activity::{
    Activity, ActivityType, ChannelAccount, ConversationAccount, ConversationReference,
    Formatting, IncomingMessage, OutgoingActivity, OutgoingMessage,
};
pub use connector::{ActivitySender, AppCredentials, ConnectorClient};
pub use webhook::{Delivery, MessageCard, WebhookClient};
