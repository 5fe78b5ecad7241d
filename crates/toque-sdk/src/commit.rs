//! Commit gateway: serialized durable writes per document identity
//!
//! A commit is three strictly ordered steps: upload any not-yet-durable blob
//! fields to the content store, submit one registry write referencing the
//! resulting content refs, and await confirmation within a bounded window.
//!
//! The registry record is a single mutable slot keyed by identity, so two
//! concurrent writes for the same identity could silently discard one set of
//! edits. The gateway holds a per-identity async lock across the whole
//! commit: a second commit for the same identity queues behind the first
//! rather than interleaving. Once submitted, a write cannot be canceled;
//! a confirmation timeout is reported as failure even though the write may
//! still land.
//!
//! Failure at any step leaves no partial durable write. Blobs uploaded
//! before a failed registry write stay behind as unreferenced garbage,
//! which is harmless: uploads are idempotent and content-addressed.

use crate::document::{BlobField, ContentRef, Document, DurableId};
use crate::error::{Result, StudioError};
use crate::traits::{ContentStore, DurableRegistry, RecordSummary};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Terminal or in-flight state of a commit attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitStatus {
    Pending,
    Success,
    Failed,
}

/// The last commit attempt for an identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitRecord {
    /// Identity the commit was keyed by (durable id, or the local draft id
    /// for a first commit)
    pub identity: String,
    /// When the attempt started
    pub attempted_at: DateTime<Utc>,
    /// Current state
    pub status: CommitStatus,
    /// Failure reason when status is failed
    pub error_reason: Option<String>,
}

/// A confirmed commit
#[derive(Debug, Clone)]
pub struct CommitOutcome {
    /// Registry identity; for a first commit, the newly assigned slot
    pub identity: DurableId,
    /// Transaction that carried the write
    pub transaction_id: String,
    /// Content reference of the committed document body
    pub content_ref: ContentRef,
    /// The document as committed, with every blob field stored
    pub document: Document,
}

/// Configuration for the commit gateway
#[derive(Debug, Clone)]
pub struct CommitConfig {
    /// Bound on the confirmation wait. Elapsing is treated as failure even
    /// though the underlying write might still land.
    pub confirm_timeout: Duration,
}

impl Default for CommitConfig {
    fn default() -> Self {
        Self {
            confirm_timeout: Duration::from_secs(30),
        }
    }
}

/// Serializes and executes durable writes per document identity
pub struct CommitGateway {
    content: Arc<dyn ContentStore>,
    registry: Arc<dyn DurableRegistry>,
    config: CommitConfig,
    /// Per-identity commit locks; holding one across the full commit is what
    /// serializes writers
    locks: DashMap<String, Arc<Mutex<()>>>,
    /// Last commit record per identity
    records: DashMap<String, CommitRecord>,
}

impl CommitGateway {
    /// Create a gateway over the content store and registry
    pub fn new(
        content: Arc<dyn ContentStore>,
        registry: Arc<dyn DurableRegistry>,
        config: CommitConfig,
    ) -> Self {
        Self {
            content,
            registry,
            config,
            locks: DashMap::new(),
            records: DashMap::new(),
        }
    }

    /// The last commit attempt for an identity, if any
    pub fn last_record(&self, identity: &str) -> Option<CommitRecord> {
        self.records.get(identity).map(|r| r.value().clone())
    }

    /// Whether a commit is currently in flight for an identity
    pub fn is_pending(&self, identity: &str) -> bool {
        self.records
            .get(identity)
            .map(|r| r.value().status == CommitStatus::Pending)
            .unwrap_or(false)
    }

    /// Commit a document durably.
    ///
    /// `local_key` keys the serialization lock until the document has a
    /// durable identity. The caller rolls the draft back on any error;
    /// the gateway itself never touches draft state.
    pub async fn commit(&self, local_key: &str, document: &Document) -> Result<CommitOutcome> {
        let key = document
            .durable_id()
            .map(|id| id.0.clone())
            .unwrap_or_else(|| local_key.to_string());

        let lock = self
            .locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        // Queue point: a second commit for the same identity waits here
        let _guard = lock.lock().await;

        self.records.insert(key.clone(), open_record(&key));
        match self.run_commit(document).await {
            Ok(outcome) => {
                self.finish_record(&key, CommitStatus::Success, None);
                // A first commit was keyed by the local draft id; re-key the
                // record so later lookups by durable identity find it. The
                // guard from `get` must be dropped before the insert.
                if outcome.identity.0 != key {
                    let record = self.records.get(&key).map(|r| r.value().clone());
                    if let Some(record) = record {
                        self.records.insert(
                            outcome.identity.0.clone(),
                            CommitRecord {
                                identity: outcome.identity.0.clone(),
                                ..record
                            },
                        );
                    }
                }
                Ok(outcome)
            }
            Err(e) => {
                self.finish_record(&key, CommitStatus::Failed, Some(e.to_string()));
                Err(e)
            }
        }
    }

    /// Retire a durable record: a tombstone write through the same
    /// serialized path. The slot remains claimed; the document is gone.
    pub async fn retire(&self, document: &Document) -> Result<CommitOutcome> {
        let identity = document.durable_id().ok_or(StudioError::NotDurable)?.clone();
        let key = identity.0.clone();

        let lock = self
            .locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        self.records.insert(key.clone(), open_record(&key));

        let result = async {
            let body = serde_json::to_vec(&serde_json::json!({ "retired": true }))?;
            let body_ref = self
                .content
                .put("application/json", &body)
                .await
                .map_err(|e| upload_err("tombstone body", e))?;

            let summary = RecordSummary {
                tier: document.tier(),
                display_name: document.core().display_name.clone(),
                tombstone: true,
            };

            self.write_and_confirm(Some(&identity), &body_ref, summary)
                .await
                .map(|(identity, transaction_id)| CommitOutcome {
                    identity,
                    transaction_id,
                    content_ref: body_ref,
                    document: document.clone(),
                })
        }
        .await;

        match result {
            Ok(outcome) => {
                self.finish_record(&key, CommitStatus::Success, None);
                Ok(outcome)
            }
            Err(e) => {
                self.finish_record(&key, CommitStatus::Failed, Some(e.to_string()));
                Err(e)
            }
        }
    }

    async fn run_commit(&self, document: &Document) -> Result<CommitOutcome> {
        // Step (a): upload inline blobs, replacing them with stored refs on
        // a working copy. The draft keeps its inline bytes; re-uploading
        // them next commit is a no-op by content addressing.
        let mut committed = document.clone();
        self.upload_blobs(&mut committed).await?;

        let body = serde_json::to_vec(&committed)?;
        let body_ref = self
            .content
            .put("application/json", &body)
            .await
            .map_err(|e| upload_err("document body", e))?;

        // Step (b) + (c): one registry write, then bounded confirmation
        let summary = RecordSummary {
            tier: committed.tier(),
            display_name: committed.core().display_name.clone(),
            tombstone: false,
        };

        let (identity, transaction_id) = self
            .write_and_confirm(committed.durable_id(), &body_ref, summary)
            .await?;

        committed.set_durable_id(identity.clone());

        Ok(CommitOutcome {
            identity,
            transaction_id,
            content_ref: body_ref,
            document: committed,
        })
    }

    async fn write_and_confirm(
        &self,
        identity: Option<&DurableId>,
        content_ref: &ContentRef,
        summary: RecordSummary,
    ) -> Result<(DurableId, String)> {
        let pending = self.registry.write(identity, content_ref, summary).await?;

        match tokio::time::timeout(
            self.config.confirm_timeout,
            self.registry.confirm(&pending.transaction_id),
        )
        .await
        {
            Ok(Ok(confirmation)) => Ok((confirmation.identity, pending.transaction_id)),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(StudioError::ConfirmationTimeout(
                self.config.confirm_timeout.as_secs(),
            )),
        }
    }

    async fn upload_blobs(&self, document: &mut Document) -> Result<()> {
        if let Some(avatar) = document.core().avatar.clone() {
            let stored = self.store_blob("avatar", avatar).await?;
            document.core_mut().avatar = Some(stored);
        }

        let gallery = document.pro().map(|pro| pro.gallery.clone());
        if let Some(gallery) = gallery {
            let mut stored_gallery = Vec::with_capacity(gallery.len());
            for (i, blob) in gallery.into_iter().enumerate() {
                let stored = self.store_blob(&format!("gallery[{i}]"), blob).await?;
                stored_gallery.push(stored);
            }
            if let Document::Pro { pro, .. }
            | Document::Group { pro, .. }
            | Document::Og { pro, .. } = document
            {
                pro.gallery = stored_gallery;
            }
        }

        Ok(())
    }

    async fn store_blob(&self, context: &str, blob: BlobField) -> Result<BlobField> {
        match blob {
            BlobField::Inline { media_type, bytes } => {
                let size_bytes = bytes.len() as u64;
                let content_ref = self
                    .content
                    .put(&media_type, &bytes)
                    .await
                    .map_err(|e| upload_err(context, e))?;
                Ok(BlobField::Stored {
                    media_type,
                    content_ref,
                    size_bytes,
                })
            }
            stored @ BlobField::Stored { .. } => Ok(stored),
        }
    }

    fn finish_record(&self, key: &str, status: CommitStatus, error_reason: Option<String>) {
        if let Some(mut record) = self.records.get_mut(key) {
            record.status = status;
            record.error_reason = error_reason;
        }
    }
}

fn open_record(key: &str) -> CommitRecord {
    CommitRecord {
        identity: key.to_string(),
        attempted_at: Utc::now(),
        status: CommitStatus::Pending,
        error_reason: None,
    }
}

fn upload_err(context: &str, e: StudioError) -> StudioError {
    match e {
        StudioError::UploadFailure { reason, .. } => StudioError::UploadFailure {
            context: context.to_string(),
            reason,
        },
        other => StudioError::UploadFailure {
            context: context.to_string(),
            reason: other.to_string(),
        },
    }
}
