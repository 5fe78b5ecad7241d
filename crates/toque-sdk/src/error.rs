//! Error types for the Toque SDK

use crate::document::SectionId;
use thiserror::Error;

/// Result type for SDK operations
pub type Result<T> = std::result::Result<T, StudioError>;

/// SDK error types
///
/// Every failure path returns the session to an editable state; none of these
/// are fatal to the process. `EntitlementRead` is recovered silently (the
/// resolver degrades to Free), `AccessDenied` and `Validation` are rejected
/// before any state change, and the commit-side errors roll back all
/// optimistic edits since the last successful commit.
#[derive(Error, Debug)]
pub enum StudioError {
    /// Ledger unavailable while resolving entitlements
    #[error("Entitlement read failed: {0}")]
    EntitlementRead(String),

    /// Mutation or navigation against a locked step
    #[error("Access denied to step {step_index}: requires {required}, have {actual}")]
    AccessDenied {
        step_index: usize,
        required: String,
        actual: String,
    },

    /// Section payload rejected before apply
    #[error("Invalid {section} payload: {reason}")]
    Validation { section: SectionId, reason: String },

    /// Section not present at the document's tier, or index out of range
    #[error("Section {0} is not editable on this document")]
    SectionUnavailable(SectionId),

    /// Content-store write failed; the registry write was never issued
    #[error("Upload failed for {context}: {reason}")]
    UploadFailure { context: String, reason: String },

    /// Durable registry rejected the write
    #[error("Registry write failed: {0}")]
    RegistryWriteFailure(String),

    /// Preview mirror unreachable; advisory only, never rolls anything back
    #[error("Preview sync failed: {0}")]
    PreviewSync(String),

    /// Confirmation wait elapsed; the true outcome is unknown
    #[error("Commit confirmation timed out after {0} seconds; the write may still land")]
    ConfirmationTimeout(u64),

    /// Registry or content-store read failed on the load path
    #[error("Registry read failed: {0}")]
    RegistryRead(String),

    /// Document has no durable record to load or retire
    #[error("Document has no durable identity")]
    NotDurable,

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Stored document body could not be reconstructed
    #[error("Stored document invalid: {0}")]
    CorruptRecord(String),
}

impl From<serde_json::Error> for StudioError {
    fn from(err: serde_json::Error) -> Self {
        StudioError::Serialization(err.to_string())
    }
}
