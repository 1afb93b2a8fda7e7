//! Teams relay: forwards chat messages to Claude and delivers the reply.
//!
//! Two services share this crate:
//! - `teams-bot`: a Bot Framework endpoint that answers in the same conversation.
//! - `webhook-relay`: a web form whose questions are answered and posted to a
//!   Teams incoming webhook as a message card.

pub mod bot;
pub mod channels;
pub mod config;
pub mod error;
pub mod health;
pub mod llm;
pub mod relay;
pub mod responder;
pub mod server;
pub mod telemetry;
