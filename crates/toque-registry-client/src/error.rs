//! Error types for the registry client

use thiserror::Error;

/// Registry client error
#[derive(Debug, Error)]
pub enum RegistryClientError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server returned an error
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Invalid response from server
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// A transaction was rejected by the registry
    #[error("Transaction {transaction_id} rejected: {reason}")]
    TransactionRejected {
        transaction_id: String,
        reason: String,
    },

    /// Returned bytes do not hash to the requested content reference
    #[error("Content digest mismatch for {content_ref}: got {actual}")]
    DigestMismatch {
        content_ref: String,
        actual: String,
    },
}

/// Result type for registry client operations
pub type Result<T> = std::result::Result<T, RegistryClientError>;
