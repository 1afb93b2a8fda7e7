//! One-way relay: question from a web form, answer posted to a Teams webhook.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::channels::webhook::question_answer_text;
use crate::channels::{Delivery, OutgoingMessage, WebhookClient};
use crate::health::{ConfigFlags, HealthStatus};
use crate::responder::{Reply, ReplyGenerator};
use crate::server;

const FORM_PAGE: &str = include_str!("../../assets/relay_form.html");

pub const MISSING_MESSAGE_ERROR: &str = "Nachricht ist erforderlich";
pub const DELIVERED_MESSAGE: &str = "Nachricht erfolgreich an Teams gesendet";
pub const NOT_DELIVERED_MESSAGE: &str = "Antwort generiert, aber nicht an Teams gesendet";
/// Body of the 500 answered when a handler panics.
pub const INTERNAL_ERROR_MESSAGE: &str = "Interner Serverfehler";

/// Result of relaying one question.
#[derive(Debug, Clone)]
pub struct RelayOutcome {
    pub reply: Reply,
    pub delivered: bool,
}

/// Generates an answer and posts question and answer as a card.
pub struct RelayService {
    generator: ReplyGenerator,
    webhook: WebhookClient,
}

impl RelayService {
    pub fn new(generator: ReplyGenerator, webhook: WebhookClient) -> Self {
        Self { generator, webhook }
    }

    pub fn config_flags(&self) -> ConfigFlags {
        ConfigFlags {
            claude_configured: self.generator.is_ai_configured(),
            teams_configured: self.webhook.is_configured(),
        }
    }

    /// Relay a non-empty question. Delivery problems are logged, not returned.
    pub async fn relay(&self, question: &str) -> RelayOutcome {
        let reply = self.generator.generate(question).await;
        let card = OutgoingMessage::card(question_answer_text(question, &reply.text));

        let delivered = match self.webhook.deliver(&card).await {
            Ok(Delivery::Delivered) => true,
            Ok(Delivery::Skipped) => false,
            Err(e) => {
                warn!(error = %e, "Webhook delivery failed");
                false
            }
        };

        RelayOutcome { reply, delivered }
    }
}

#[derive(Debug, Deserialize)]
struct SendRequest {
    #[serde(default)]
    message: Option<String>,
}

/// Body of a successful `POST /send`.
#[derive(Debug, Serialize)]
pub struct SendResponse {
    pub success: bool,
    pub message: &'static str,
    /// The generated answer (AI or fallback).
    pub response: String,
    /// True when the answer is the fallback text rather than an AI reply.
    pub fallback: bool,
    /// True when the card reached the webhook.
    pub delivered: bool,
}

/// Shared state for relay routes.
#[derive(Clone)]
pub struct RelayState {
    pub service: Arc<RelayService>,
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

/// GET /
async fn form_page() -> Html<&'static str> {
    Html(FORM_PAGE)
}

/// GET /health
async fn health(State(state): State<RelayState>) -> impl IntoResponse {
    Json(HealthStatus::healthy(Some(state.service.config_flags())))
}

/// POST /send
async fn send(
    State(state): State<RelayState>,
    payload: Result<Json<SendRequest>, JsonRejection>,
) -> Response {
    let question = match payload {
        Ok(Json(SendRequest { message: Some(m) })) if !m.trim().is_empty() => m,
        Ok(_) => return error_response(StatusCode::BAD_REQUEST, MISSING_MESSAGE_ERROR),
        Err(rejection) => {
            warn!(error = %rejection, "Rejected /send payload");
            return error_response(StatusCode::BAD_REQUEST, MISSING_MESSAGE_ERROR);
        }
    };

    info!(chars = question.chars().count(), "Relay message received");
    let outcome = state.service.relay(&question).await;

    Json(SendResponse {
        success: true,
        message: if outcome.delivered {
            DELIVERED_MESSAGE
        } else {
            NOT_DELIVERED_MESSAGE
        },
        fallback: outcome.reply.is_fallback(),
        response: outcome.reply.text,
        delivered: outcome.delivered,
    })
    .into_response()
}

/// Build the relay routes.
pub fn relay_routes(service: Arc<RelayService>) -> Router {
    Router::new()
        .route("/", get(form_page))
        .route("/send", post(send))
        .route("/health", get(health))
        .with_state(RelayState { service })
}

/// Relay routes with the shared middleware stack.
pub fn app(service: Arc<RelayService>) -> Router {
    server::with_middleware(relay_routes(service), INTERNAL_ERROR_MESSAGE)
}
