//! Collaborator traits for the external systems the studio engine talks to
//!
//! The engine never speaks a wire format itself. The ledger, the
//! content-addressable store, the durable registry, and the notification
//! surface are all opaque collaborators behind these traits; HTTP
//! implementations live behind the `client` feature, and tests swap in
//! in-memory fakes.

use crate::document::{ContentRef, DurableId, SectionId};
use crate::error::Result;
use crate::tier::{OwnershipSignals, Tier};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// A change event from the entitlement ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    /// An entitlement token was minted to the account
    Minted { token_id: String },
    /// An entitlement token held by the account was burned
    Burned { token_id: String },
}

/// Read-only entitlement ledger.
///
/// Ownership signals decide the account's tier; `subscribe` delivers
/// mint/burn notifications so cached entitlements can be invalidated.
#[async_trait]
pub trait EntitlementLedger: Send + Sync {
    /// Read ownership signals for an account
    async fn get_entitlement(&self, account: &str) -> Result<OwnershipSignals>;

    /// Subscribe to ownership change events for an account.
    ///
    /// The stream closes when the ledger connection is gone; the engine
    /// keeps its last resolved tier in that case.
    fn subscribe(&self, account: &str) -> mpsc::Receiver<LedgerEvent>;
}

/// Content-addressable blob store.
///
/// `put` is idempotent: the reference is a hash of the bytes, so concurrent
/// or repeated uploads of identical content land on the same reference and
/// never conflict. An upload that is never referenced by a registry record
/// is harmless garbage.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Store bytes and return their content reference
    async fn put(&self, media_type: &str, bytes: &[u8]) -> Result<ContentRef>;

    /// Fetch bytes by content reference
    async fn get(&self, content_ref: &ContentRef) -> Result<Vec<u8>>;
}

/// Indexed fields written alongside the content reference on a registry record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordSummary {
    /// Tier the document was committed at
    pub tier: Tier,
    /// Display name for registry listings
    pub display_name: String,
    /// Marks the record as retired
    #[serde(default)]
    pub tombstone: bool,
}

/// A submitted, not-yet-confirmed registry write
#[derive(Debug, Clone)]
pub struct PendingWrite {
    /// Transaction ID to await confirmation on
    pub transaction_id: String,
}

/// A confirmed registry write
#[derive(Debug, Clone)]
pub struct WriteConfirmation {
    /// Record identity; for a fresh write this is the newly assigned slot
    pub identity: DurableId,
}

/// A registry record as read back
#[derive(Debug, Clone)]
pub struct StoredRecord {
    /// Record identity
    pub identity: DurableId,
    /// Content reference for the current document body
    pub content_ref: ContentRef,
    /// Indexed fields from the last write
    pub summary: RecordSummary,
}

/// Durable registry: a single mutable slot per record identity.
///
/// Writes are transactions that confirm or fail after submission. Once
/// submitted a transaction cannot be canceled; callers bound the wait on
/// `confirm` and treat a timeout as failure.
#[async_trait]
pub trait DurableRegistry: Send + Sync {
    /// Submit a write. `identity = None` claims a new slot.
    async fn write(
        &self,
        identity: Option<&DurableId>,
        content_ref: &ContentRef,
        summary: RecordSummary,
    ) -> Result<PendingWrite>;

    /// Wait until the transaction confirms or fails.
    ///
    /// Resolves with the confirmed identity, or an error for a rejected
    /// write. Implementations may wait indefinitely; the commit gateway
    /// applies the bounded timeout.
    async fn confirm(&self, transaction_id: &str) -> Result<WriteConfirmation>;

    /// Read a record by identity. `None` for an unclaimed slot.
    async fn read(&self, identity: &DurableId) -> Result<Option<StoredRecord>>;
}

/// Severity of a user-visible notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// Operation landed
    Success,
    /// Operation failed and was rolled back
    Error,
}

/// A user-visible notification
#[derive(Debug, Clone)]
pub struct Notification {
    /// Severity
    pub kind: NotificationKind,
    /// Section the notification is about, when there is one
    pub section: Option<SectionId>,
    /// Human-readable message
    pub message: String,
}

impl Notification {
    /// A success notification
    pub fn success(section: Option<SectionId>, message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Success,
            section,
            message: message.into(),
        }
    }

    /// An error notification
    pub fn error(section: Option<SectionId>, message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Error,
            section,
            message: message.into(),
        }
    }
}

/// Fire-and-forget user-visible success/failure surface
pub trait NotificationSink: Send + Sync {
    /// Deliver a notification. Must not block or fail.
    fn notify(&self, notification: Notification);
}

/// Default notification sink: structured log lines
#[derive(Debug, Default)]
pub struct LogNotifier;

impl NotificationSink for LogNotifier {
    fn notify(&self, notification: Notification) {
        match notification.kind {
            NotificationKind::Success => {
                tracing::info!(
                    section = ?notification.section,
                    "{}", notification.message
                );
            }
            NotificationKind::Error => {
                tracing::error!(
                    section = ?notification.section,
                    "{}", notification.message
                );
            }
        }
    }
}
