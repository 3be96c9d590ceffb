//! Provider event intake and reconciliation
//!
//! Receives Cloud API webhook deliveries (inbound messages and delivery
//! status callbacks) and reconciles them into the conversation store.
//! Every delivery is acknowledged with `200`, whatever happens per item.

pub mod event;
pub mod handler;
pub mod reconciler;

pub use handler::{webhook_router, WebhookState};
pub use reconciler::{BatchSummary, Reconciler};
