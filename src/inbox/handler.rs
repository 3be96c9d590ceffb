//! HTTP handlers for the conversation management API
//!
//! Provides 4 REST endpoints for browsing the inbox and sending messages:
//! - GET  /api/v1/conversations                       - list conversations
//! - GET  /api/v1/conversations/:identifier/messages  - message history
//! - GET  /api/v1/conversations/:identifier/status    - activity summary
//! - POST /api/v1/messages                            - send a text message

use crate::error::Error;
use crate::inbox::store::ConversationStore;
use crate::inbox::types::ApiError;
use crate::outbound::Dispatcher;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Shared state for inbox handlers
#[derive(Clone)]
pub struct InboxState {
    pub store: Arc<dyn ConversationStore>,
    pub dispatcher: Arc<Dispatcher>,
}

/// Create the inbox router with all REST endpoints
pub fn inbox_router(state: InboxState) -> Router {
    Router::new()
        .route("/api/v1/conversations", get(list_conversations))
        .route(
            "/api/v1/conversations/:identifier/messages",
            get(get_messages),
        )
        .route("/api/v1/conversations/:identifier/status", get(get_status))
        .route("/api/v1/messages", post(send_message))
        .with_state(state)
}

// =============================================================================
// Request/response types
// =============================================================================

#[derive(Debug, Deserialize)]
struct SendMessageRequest {
    #[serde(default)]
    to: String,
    #[serde(default)]
    body: String,
}

#[derive(Debug, Serialize)]
struct SendMessageResponse {
    message_id: Option<String>,
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct ConversationStatus {
    identifier: String,
    last_message_at: Option<i64>,
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /api/v1/conversations
async fn list_conversations(State(state): State<InboxState>) -> impl IntoResponse {
    match state.store.list_conversations().await {
        Ok(conversations) => (
            StatusCode::OK,
            Json(serde_json::to_value(conversations).unwrap()),
        ),
        Err(err) => storage_failure("list conversations", err),
    }
}

/// GET /api/v1/conversations/:identifier/messages
///
/// An unknown identifier yields an empty list rather than a 404; inbox
/// frontends poll this endpoint before the first message arrives.
async fn get_messages(
    State(state): State<InboxState>,
    Path(identifier): Path<String>,
) -> impl IntoResponse {
    match state.store.get_conversation(&identifier).await {
        Ok(conversation) => {
            let messages = conversation.map(|c| c.messages).unwrap_or_default();
            (
                StatusCode::OK,
                Json(serde_json::to_value(messages).unwrap()),
            )
        }
        Err(err) => storage_failure("load messages", err),
    }
}

/// GET /api/v1/conversations/:identifier/status
///
/// Reports the most recent message timestamp for the contact, any
/// direction. Unknown identifiers report `null`.
async fn get_status(
    State(state): State<InboxState>,
    Path(identifier): Path<String>,
) -> impl IntoResponse {
    match state.store.get_conversation(&identifier).await {
        Ok(conversation) => {
            let last_message_at =
                conversation.and_then(|c| c.messages.iter().map(|m| m.timestamp).max());
            let status = ConversationStatus {
                identifier,
                last_message_at,
            };
            (StatusCode::OK, Json(serde_json::to_value(status).unwrap()))
        }
        Err(err) => storage_failure("load conversation status", err),
    }
}

/// POST /api/v1/messages
async fn send_message(
    State(state): State<InboxState>,
    Json(request): Json<SendMessageRequest>,
) -> impl IntoResponse {
    match state.dispatcher.send(&request.to, &request.body).await {
        Ok(receipt) => (
            StatusCode::OK,
            Json(
                serde_json::to_value(SendMessageResponse {
                    message_id: receipt.message_id,
                    status: "sent",
                })
                .unwrap(),
            ),
        ),
        Err(Error::InvalidArgument(message)) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::to_value(ApiError::bad_request(message)).unwrap()),
        ),
        Err(Error::Upstream { status, body }) => (
            StatusCode::BAD_GATEWAY,
            Json(
                serde_json::to_value(ApiError::upstream(format!(
                    "Provider rejected the message (status {}): {}",
                    status, body
                )))
                .unwrap(),
            ),
        ),
        Err(Error::Http(err)) => (
            StatusCode::BAD_GATEWAY,
            Json(
                serde_json::to_value(ApiError::upstream(format!(
                    "Failed to reach the provider: {}",
                    err
                )))
                .unwrap(),
            ),
        ),
        Err(err) => {
            tracing::error!("Failed to send message: {}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::to_value(ApiError::internal("Failed to send message")).unwrap()),
            )
        }
    }
}

fn storage_failure(action: &str, err: Error) -> (StatusCode, Json<serde_json::Value>) {
    tracing::error!("Failed to {}: {}", action, err);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::to_value(ApiError::internal(format!("Failed to {}", action))).unwrap()),
    )
}
