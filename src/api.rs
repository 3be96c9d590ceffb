//! Unified API router for Relaybox
//!
//! Merges the webhook and inbox routers into a single axum `Router`
//! with CORS, request tracing, and a root health probe.
//!
//! ## Endpoint Map
//!
//! | Prefix                  | Module  | Description                      |
//! |-------------------------|---------|----------------------------------|
//! | `/health`               | root    | Load balancer health probe       |
//! | `/webhook`              | webhook | Provider handshake + deliveries  |
//! | `/api/v1/conversations` | inbox   | Conversation listing and history |
//! | `/api/v1/messages`      | inbox   | Outbound message submission      |

use crate::inbox::{inbox_router, InboxState};
use crate::webhook::{webhook_router, WebhookState};
use axum::{
    http::{header, Method},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the complete Relaybox HTTP application
///
/// Merges the module routers, adds CORS and tracing middleware, and
/// returns a single `Router` ready to be served by `axum::serve`.
pub fn build_app(
    webhook_state: WebhookState,
    inbox_state: InboxState,
    cors_origins: &[String],
) -> Router {
    let cors = build_cors(cors_origins);

    Router::new()
        // Root-level probe
        .route("/health", get(health_check))
        // Module routers (each defines its own prefixed routes)
        .merge(webhook_router(webhook_state))
        .merge(inbox_router(inbox_state))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

// =============================================================================
// Root handlers
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// =============================================================================
// CORS
// =============================================================================

fn build_cors(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

    if origins.is_empty() {
        cors.allow_origin(Any)
    } else {
        let parsed: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        cors.allow_origin(parsed)
    }
}
