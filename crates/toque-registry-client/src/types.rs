//! Types for the registry, ledger, and content store APIs

use serde::{Deserialize, Serialize};

/// Client configuration
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Base URL for the registry HTTP API
    pub base_url: String,
    /// Realm for namespacing (one registry serves many products)
    pub realm: String,
    /// Optional API key for authentication
    pub api_key: Option<String>,
    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,
    /// Interval between transaction status polls in milliseconds (default: 500)
    pub poll_interval_ms: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            realm: "toque".to_string(),
            api_key: None,
            timeout_secs: 30,
            poll_interval_ms: 500,
        }
    }
}

/// Indexed fields stored on a registry record alongside the content reference
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordFields {
    /// Entitlement tier the document was committed at
    pub tier: String,
    /// Display name for registry listings
    pub display_name: String,
    /// Marks the record as retired; the slot stays but the document is gone
    #[serde(default)]
    pub tombstone: bool,
}

/// Request body for a registry write
#[derive(Debug, Clone, Serialize)]
pub struct WriteRecordRequest {
    /// Existing record identity, or None to claim a new slot
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    /// Content reference for the document body
    pub content_ref: String,
    /// Indexed record fields
    pub fields: RecordFields,
}

/// Response from a registry write: the transaction is in flight, not confirmed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteRecordResponse {
    /// Transaction ID to poll for confirmation
    pub transaction_id: String,
}

/// Terminal or in-flight state of a registry transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionState {
    /// Submitted, not yet confirmed
    Pending,
    /// Durably written
    Confirmed,
    /// Rejected by the registry
    Failed,
}

/// Response from the transaction status endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionStatusResponse {
    /// Transaction ID
    pub transaction_id: String,
    /// Current state
    pub status: TransactionState,
    /// Record identity, present once confirmed (new slots get one assigned)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    /// Failure reason when status is failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A registry record as read back
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryRecord {
    /// Record identity (the single mutable slot key)
    pub identity: String,
    /// Content reference for the current document body
    pub content_ref: String,
    /// Indexed record fields
    pub fields: RecordFields,
    /// Last write timestamp (RFC 3339)
    pub updated_at: String,
}

/// Raw ownership signals from the entitlement ledger
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntitlementResponse {
    /// Account owns a Pro entitlement token
    pub owns_pro: bool,
    /// Account owns a Group entitlement token
    pub owns_group: bool,
    /// Account owns an OG entitlement token
    pub owns_og: bool,
    /// Token IDs backing the signals above
    #[serde(default)]
    pub token_ids: Vec<String>,
}

/// Response from a blob upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutBlobResponse {
    /// Content reference the server stored the blob under
    pub content_ref: String,
    /// Stored size in bytes
    pub size: u64,
}
