//! Core types for the conversation inbox
//!
//! Defines the conversation/message data model shared by the storage
//! backends, the reconciliation engine, and the management API. All wire
//! types serialize with snake_case field names.

use serde::{Deserialize, Serialize};

/// Direction of a message relative to this relay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Received from a contact via the provider webhook
    In,
    /// Submitted by us through the provider send API
    Out,
    /// Synthesized locally (e.g. delivery failure notices)
    System,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::In => write!(f, "in"),
            Self::Out => write!(f, "out"),
            Self::System => write!(f, "system"),
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in" => Ok(Self::In),
            "out" => Ok(Self::Out),
            "system" => Ok(Self::System),
            other => Err(format!("unknown message direction: {}", other)),
        }
    }
}

/// Delivery status of a message
///
/// The provider reports a small set of well-known labels, but the set is
/// open-ended; labels we do not recognize are preserved verbatim rather
/// than rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DeliveryStatus {
    /// Inbound message stored locally
    Received,
    /// Accepted by the provider for delivery
    Sent,
    /// Delivered to the recipient's device
    Delivered,
    /// Read by the recipient
    Read,
    /// Delivery failed
    Failed,
    /// Any label we do not recognize, kept as-is
    Other(String),
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Received => "received",
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Read => "read",
            Self::Failed => "failed",
            Self::Other(label) => label.as_str(),
        }
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<String> for DeliveryStatus {
    fn from(label: String) -> Self {
        match label.as_str() {
            "received" => Self::Received,
            "sent" => Self::Sent,
            "delivered" => Self::Delivered,
            "read" => Self::Read,
            "failed" => Self::Failed,
            _ => Self::Other(label),
        }
    }
}

impl From<&str> for DeliveryStatus {
    fn from(label: &str) -> Self {
        Self::from(label.to_string())
    }
}

impl From<DeliveryStatus> for String {
    fn from(status: DeliveryStatus) -> Self {
        status.as_str().to_string()
    }
}

/// A single message within a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Provider-assigned message identifier (`wamid.…`); `None` for
    /// locally synthesized records
    pub provider_id: Option<String>,
    pub direction: Direction,
    pub body: String,
    pub status: DeliveryStatus,
    /// Epoch seconds; only ever advanced, never regressed
    pub timestamp: i64,
}

/// A conversation with one contact, keyed by phone identifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Stable contact identifier (phone number, E.164-like)
    pub identifier: String,
    /// Display name, refined as the provider reports it
    pub name: Option<String>,
    /// Epoch seconds of the most recent activity; only ever advanced
    pub last_activity: i64,
    /// Message history, oldest first
    #[serde(default)]
    pub messages: Vec<MessageRecord>,
}

/// Input for appending a message to a conversation
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub provider_id: Option<String>,
    pub direction: Direction,
    pub body: String,
    pub status: DeliveryStatus,
    pub timestamp: i64,
}

impl NewMessage {
    /// An inbound message received from a contact
    pub fn inbound(provider_id: Option<String>, body: impl Into<String>, timestamp: i64) -> Self {
        Self {
            provider_id,
            direction: Direction::In,
            body: body.into(),
            status: DeliveryStatus::Received,
            timestamp,
        }
    }

    /// An outbound message accepted by the provider
    pub fn outbound(provider_id: Option<String>, body: impl Into<String>, timestamp: i64) -> Self {
        Self {
            provider_id,
            direction: Direction::Out,
            body: body.into(),
            status: DeliveryStatus::Sent,
            timestamp,
        }
    }

    /// A locally synthesized notice (no provider identifier)
    pub fn system(body: impl Into<String>, timestamp: i64) -> Self {
        Self {
            provider_id: None,
            direction: Direction::System,
            body: body.into(),
            status: DeliveryStatus::Failed,
            timestamp,
        }
    }
}

/// Current time as epoch seconds
pub fn now_ts() -> i64 {
    chrono::Utc::now().timestamp()
}

/// API error response
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

/// API error detail
#[derive(Debug, Serialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: "BAD_REQUEST".to_string(),
                message: message.into(),
            },
        }
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: "UPSTREAM_ERROR".to_string(),
                message: message.into(),
            },
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: "INTERNAL_ERROR".to_string(),
                message: message.into(),
            },
        }
    }
}
