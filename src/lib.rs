//! Relaybox - Webhook-driven WhatsApp relay and inbox store
//!
//! Relaybox sits between a Cloud-API-shaped messaging provider and a
//! local inbox: it receives webhook deliveries (inbound messages and
//! delivery status callbacks), reconciles them into a conversation
//! store, and exposes a management API for browsing conversations and
//! submitting outbound text messages.
//!
//! ## Architecture
//!
//! ```text
//!              Messaging provider (Cloud-API-shaped)
//!                  │                        ▲
//!                  │ webhook deliveries     │ HTTPS sends
//!                  ▼                        │
//!   ┌──────────────────────────┐   ┌───────┴──────────────┐
//!   │     Webhook boundary     │   │  Outbound dispatcher │
//!   │   GET  /webhook          │   └───────▲──────────────┘
//!   │   POST /webhook          │           │
//!   └────────────┬─────────────┘   ┌───────┴──────────────┐
//!                │                 │    Management API    │
//!                ▼                 │  conversations, send │
//!   ┌──────────────────────────┐   └───────┬──────────────┘
//!   │  Reconciliation engine   │           │ reads
//!   └────────────┬─────────────┘           │
//!                │ appends, status updates │
//!                ▼                         ▼
//!   ┌──────────────────────────────────────────────────────┐
//!   │      Conversation store (in-memory or SQLite)        │
//!   └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Key Properties
//!
//! - Webhook deliveries are always acknowledged with `200`; malformed
//!   payloads are logged and dropped, never bounced back to the
//!   provider.
//! - Conversation activity and message timestamps only ever advance,
//!   so out-of-order status callbacks cannot rewind history.
//! - Undeliverable-recipient failures surface as synthesized system
//!   messages inside the affected conversation.
//!
//! ## Modules
//!
//! - [`webhook`]: Provider webhook boundary and delivery reconciliation
//! - [`inbox`]: Conversation data model, storage backends, management API
//! - [`outbound`]: Text message submission to the provider send API
//! - [`api`]: Unified router assembly
//! - [`config`]: Configuration management
//! - [`error`]: Error types

pub mod api;
pub mod config;
pub mod error;
pub mod inbox;
pub mod outbound;
pub mod webhook;

pub use config::RelayConfig;
pub use error::{Error, Result};
