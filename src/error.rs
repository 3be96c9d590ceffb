//! Relaybox error types

use thiserror::Error;

/// Relaybox error type
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Missing or empty required field on a caller-supplied request
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The messaging provider rejected or failed a request; body is the
    /// provider's error payload, verbatim
    #[error("Upstream error (status {status}): {body}")]
    Upstream { status: u16, body: String },

    /// Inbound webhook payload did not match any recognized shape
    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for Relaybox operations
pub type Result<T> = std::result::Result<T, Error>;
