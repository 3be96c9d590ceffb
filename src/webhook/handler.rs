//! HTTP boundary for the provider webhook
//!
//! Two endpoints on the path registered with the provider:
//! - GET  /webhook  - subscription verification handshake
//! - POST /webhook  - event deliveries

use crate::webhook::reconciler::Reconciler;
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

/// Shared state for webhook handlers
#[derive(Clone)]
pub struct WebhookState {
    pub reconciler: Arc<Reconciler>,
    pub verify_token: String,
}

/// Create the webhook router
pub fn webhook_router(state: WebhookState) -> Router {
    Router::new()
        .route("/webhook", get(verify_subscription))
        .route("/webhook", post(receive_delivery))
        .with_state(state)
}

/// Query parameters of the verification handshake
#[derive(Debug, Deserialize)]
struct VerifyParams {
    #[serde(rename = "hub.mode")]
    mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,
}

/// GET /webhook
///
/// The provider probes this endpoint when the webhook URL is registered;
/// echoing the challenge verbatim proves we own the endpoint.
async fn verify_subscription(
    State(state): State<WebhookState>,
    Query(params): Query<VerifyParams>,
) -> impl IntoResponse {
    let mode_ok = params.mode.as_deref() == Some("subscribe");
    let token_ok = params.verify_token.as_deref() == Some(state.verify_token.as_str());

    if mode_ok && token_ok {
        tracing::info!("Webhook subscription verified");
        (StatusCode::OK, params.challenge.unwrap_or_default())
    } else {
        tracing::warn!("Webhook verification rejected");
        (StatusCode::FORBIDDEN, "verification failed".to_string())
    }
}

/// POST /webhook
///
/// Deliveries are acknowledged unconditionally. A non-2xx response
/// makes the provider retry the delivery and eventually disable the
/// subscription, so malformed payloads are logged and dropped instead
/// of rejected.
async fn receive_delivery(State(state): State<WebhookState>, body: Bytes) -> impl IntoResponse {
    match serde_json::from_slice::<Value>(&body) {
        Ok(payload) => {
            let summary = state.reconciler.apply(&payload).await;
            tracing::debug!(
                "Webhook delivery processed: {} messages, {} statuses, {} skipped",
                summary.messages,
                summary.statuses,
                summary.skipped
            );
        }
        Err(err) => {
            tracing::warn!("Discarding non-JSON webhook delivery: {}", err);
        }
    }

    Json(json!({"status": "received"}))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inbox::store::{ConversationStore, MemoryStore};
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn make_state() -> (WebhookState, Arc<dyn ConversationStore>) {
        let store: Arc<dyn ConversationStore> = Arc::new(MemoryStore::new());
        let state = WebhookState {
            reconciler: Arc::new(Reconciler::new(store.clone())),
            verify_token: "secret-token".to_string(),
        };
        (state, store)
    }

    async fn body_string(response: axum::response::Response) -> String {
        let body = axum::body::to_bytes(response.into_body(), 1024 * 64)
            .await
            .unwrap();
        String::from_utf8(body.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_verification_echoes_challenge() {
        let (state, _store) = make_state();
        let app = webhook_router(state);
        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/webhook?hub.mode=subscribe&hub.verify_token=secret-token&hub.challenge=1158201444")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_string(resp).await, "1158201444");
    }

    #[tokio::test]
    async fn test_verification_rejects_wrong_token() {
        let (state, _store) = make_state();
        let app = webhook_router(state);
        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/webhook?hub.mode=subscribe&hub.verify_token=wrong&hub.challenge=123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_verification_rejects_missing_mode() {
        let (state, _store) = make_state();
        let app = webhook_router(state);
        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/webhook?hub.verify_token=secret-token&hub.challenge=123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_delivery_is_acknowledged_and_stored() {
        let (state, store) = make_state();
        let app = webhook_router(state);

        let payload = serde_json::json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "id": "1234567890",
                "changes": [{
                    "field": "messages",
                    "value": {
                        "messaging_product": "whatsapp",
                        "contacts": [{
                            "wa_id": "5511999999999",
                            "profile": {"name": "Alice"}
                        }],
                        "messages": [{
                            "from": "5511999999999",
                            "id": "wamid.INBOUND1",
                            "timestamp": "1700000000",
                            "type": "text",
                            "text": {"body": "hello there"}
                        }]
                    }
                }]
            }]
        });

        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/webhook")
                    .header("content-type", "application/json")
                    .body(Body::from(payload.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let json: Value = serde_json::from_str(&body_string(resp).await).unwrap();
        assert_eq!(json["status"], "received");

        let conversation = store
            .get_conversation("5511999999999")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(conversation.name.as_deref(), Some("Alice"));
        assert_eq!(conversation.messages.len(), 1);
        assert_eq!(conversation.messages[0].body, "hello there");
    }

    #[tokio::test]
    async fn test_non_json_delivery_still_acknowledged() {
        let (state, _store) = make_state();
        let app = webhook_router(state);
        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/webhook")
                    .body(Body::from("not json at all {{{"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let json: Value = serde_json::from_str(&body_string(resp).await).unwrap();
        assert_eq!(json["status"], "received");
    }

    #[tokio::test]
    async fn test_unrecognized_payload_still_acknowledged() {
        let (state, store) = make_state();
        let app = webhook_router(state);
        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/webhook")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"object": "page", "entry": []}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert!(store.list_conversations().await.unwrap().is_empty());
    }
}
