//! HTTP endpoints of the bot service.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::warn;

use super::BotHandler;
use crate::channels::{Activity, ConversationReference};
use crate::error::ChannelError;
use crate::health::{HealthStatus, now_rfc3339};
use crate::server;

/// Shared state for bot routes.
#[derive(Clone)]
pub struct BotState {
    pub handler: Arc<BotHandler>,
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

/// GET /
async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "message": "Teams Claude Bot ist online!",
        "timestamp": now_rfc3339(),
        "endpoints": {
            "messages": "/api/messages",
            "health": "/health"
        }
    }))
}

/// GET /health
async fn health() -> impl IntoResponse {
    Json(HealthStatus::healthy(None))
}

/// POST /api/messages
///
/// Runs one bot turn. 400 for payloads that are not a usable activity,
/// otherwise 200: a failed turn is reported to the user by the error hook, and
/// answering 500 would make the channel service redeliver the activity.
async fn post_messages(
    State(state): State<BotState>,
    payload: Result<Json<Activity>, JsonRejection>,
) -> Response {
    let Json(activity) = match payload {
        Ok(activity) => activity,
        Err(rejection) => {
            warn!(error = %rejection, "Rejected activity payload");
            return error_response(StatusCode::BAD_REQUEST, "Invalid activity");
        }
    };

    match state.handler.on_turn(&activity).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(ChannelError::InvalidMessage(reason)) => {
            warn!(%reason, "Activity cannot be answered");
            error_response(StatusCode::BAD_REQUEST, "Invalid activity")
        }
        Err(e) => {
            let reference = ConversationReference::from_activity(&activity).ok();
            state.handler.on_turn_error(reference.as_ref(), &e).await;
            StatusCode::OK.into_response()
        }
    }
}

/// Build the bot routes.
pub fn bot_routes(handler: Arc<BotHandler>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/messages", post(post_messages))
        .with_state(BotState { handler })
}

/// Body of the 500 answered when a handler panics.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// Bot routes with the shared middleware stack.
pub fn app(handler: Arc<BotHandler>) -> Router {
    server::with_middleware(bot_routes(handler), INTERNAL_ERROR_MESSAGE)
}
