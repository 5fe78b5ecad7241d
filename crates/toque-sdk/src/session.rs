//! Studio session: the explicit handle every operation goes through
//!
//! One session edits one document for one account. There is no ambient
//! global; the UI holds a session reference and calls the surface below.
//! The session owns the mutation sequencing pipeline:
//!
//! ```text
//! edit -> gate -> pin snapshot -> apply (sync) -> preview (fire-and-forget)
//!      -> [commit policy] busy -> gateway.commit -> success: discard pin
//!                                                -> failure: rollback + error
//! ```
//!
//! The optimistic apply always completes before any async work is scheduled.
//! Exactly one commit per document is in flight at a time; a second request
//! queues behind the gateway's per-identity lock. Local edits stay allowed
//! while a commit is in flight - busy gates commits, not typing.

use crate::access::AccessGate;
use crate::commit::{CommitConfig, CommitGateway, CommitOutcome, CommitRecord};
use crate::document::{Document, DurableId, Mutation, SectionId, CommitPolicy};
use crate::draft::DraftStore;
use crate::error::{Result, StudioError};
use crate::preview::{self, PreviewSink};
use crate::steps::{StepCatalog, StepDescriptor};
use crate::tier::{Tier, TierResolver};
use crate::traits::{
    ContentStore, DurableRegistry, EntitlementLedger, Notification, NotificationSink,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex, Weak};
use tokio::sync::watch;

/// The external collaborators a session is wired to
pub struct Collaborators {
    pub ledger: Arc<dyn EntitlementLedger>,
    pub content: Arc<dyn ContentStore>,
    pub registry: Arc<dyn DurableRegistry>,
    pub preview: Arc<dyn PreviewSink>,
    pub notifier: Arc<dyn NotificationSink>,
}

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Bound on commit confirmation waits
    pub confirm_timeout: std::time::Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            confirm_timeout: std::time::Duration::from_secs(30),
        }
    }
}

/// A single-writer editing session over one document
pub struct StudioSession {
    /// Local draft key; the commit lock is keyed by this until the first
    /// successful commit assigns a durable identity
    draft_id: String,
    resolver: Arc<TierResolver>,
    gateway: CommitGateway,
    registry: Arc<dyn DurableRegistry>,
    content: Arc<dyn ContentStore>,
    preview: Arc<dyn PreviewSink>,
    notifier: Arc<dyn NotificationSink>,
    /// Draft operations are synchronous; the guard is never held across an
    /// await
    draft: StdMutex<DraftStore>,
    /// Serializes this session's commits: a queued commit re-reads the
    /// draft after the one ahead of it finishes, so it targets the slot
    /// that commit may have just claimed
    commit_lock: tokio::sync::Mutex<()>,
    /// Commits in flight (0 or, transiently while one queues, more)
    inflight: AtomicUsize,
    /// Furthest completed step, for navigation callers
    completed: AtomicUsize,
    last_error: StdMutex<Option<String>>,
    watcher: StdMutex<Option<tokio::task::JoinHandle<()>>>,
}

impl StudioSession {
    /// Open a session for an account.
    ///
    /// Resolves the entitlement tier, creates an empty document at that
    /// tier, and starts the ledger watcher that re-resolves on mint/burn
    /// events and reshapes the draft when the tier changes.
    pub async fn open(
        account: impl Into<String>,
        collaborators: Collaborators,
        config: SessionConfig,
    ) -> Arc<Self> {
        let resolver = Arc::new(TierResolver::new(
            collaborators.ledger.clone(),
            account,
        ));
        let entitlement = resolver.resolve().await;

        let gateway = CommitGateway::new(
            collaborators.content.clone(),
            collaborators.registry.clone(),
            CommitConfig {
                confirm_timeout: config.confirm_timeout,
            },
        );

        let session = Arc::new(Self {
            draft_id: format!("draft-{}", uuid::Uuid::new_v4()),
            resolver: resolver.clone(),
            gateway,
            registry: collaborators.registry,
            content: collaborators.content,
            preview: collaborators.preview,
            notifier: collaborators.notifier,
            draft: StdMutex::new(DraftStore::new(Document::new(entitlement.tier))),
            commit_lock: tokio::sync::Mutex::new(()),
            inflight: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            last_error: StdMutex::new(None),
            watcher: StdMutex::new(None),
        });

        let events = collaborators.ledger.subscribe(resolver.account());
        let weak = Arc::downgrade(&session);
        let task = tokio::spawn(async move {
            ledger_watch_loop(weak, events).await;
        });
        *session.watcher.lock().expect("watcher lock") = Some(task);

        session
    }

    // ==================== UI surface ====================

    /// Ordered steps the current tier unlocks
    pub fn steps(&self) -> Vec<StepDescriptor> {
        StepCatalog::steps_for(self.resolver.current_tier())
    }

    /// Whether a step index is reachable right now
    pub fn can_access(&self, step_index: usize) -> bool {
        AccessGate::can_access(
            step_index,
            self.resolver.current_tier(),
            self.completed.load(Ordering::SeqCst),
        )
    }

    /// Reactive snapshot of the current document
    pub fn current_document(&self) -> Document {
        self.draft.lock().expect("draft lock").document().clone()
    }

    /// Draft revision; moves on every state change
    pub fn revision(&self) -> u64 {
        self.draft.lock().expect("draft lock").revision()
    }

    /// Whether a commit is in flight (or queued) for this document
    pub fn is_busy(&self) -> bool {
        self.inflight.load(Ordering::SeqCst) > 0
    }

    /// The last surfaced commit-layer error, cleared by the next success
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().expect("error lock").clone()
    }

    /// Current entitlement tier
    pub fn tier(&self) -> Tier {
        self.resolver.current_tier()
    }

    /// Subscribe to tier changes
    pub fn watch_tier(&self) -> watch::Receiver<Tier> {
        self.resolver.watch_tier()
    }

    /// Last commit attempt for this document
    pub fn last_commit_record(&self) -> Option<CommitRecord> {
        let key = self
            .current_document()
            .durable_id()
            .map(|id| id.0.clone())
            .unwrap_or_else(|| self.draft_id.clone());
        self.gateway.last_record(&key)
    }

    /// Mark a step completed for sequential-navigation callers
    pub fn mark_completed(&self, step_index: usize) {
        self.completed.fetch_max(step_index + 1, Ordering::SeqCst);
    }

    // ==================== Mutation pipeline ====================

    /// Apply one edit through the full pipeline.
    ///
    /// Gate first: a mutation against a locked step is rejected before any
    /// state change and never reaches the commit layer. The optimistic
    /// apply then completes synchronously, the preview sync is scheduled
    /// fire-and-forget, and a mutation with `CommitPolicy::Immediate`
    /// drives a durable commit before returning.
    pub async fn apply_mutation(&self, mutation: Mutation) -> Result<()> {
        let tier = self.resolver.current_tier();
        let step_index = StepCatalog::index_of(mutation.section);
        AccessGate::check_access(step_index, tier, self.completed.load(Ordering::SeqCst))?;

        let (document_id, partial) = {
            let mut draft = self.draft.lock().expect("draft lock");
            draft.snapshot();
            draft.apply(&mutation)?;

            let document = draft.document();
            let document_id = document
                .durable_id()
                .map(|id| id.0.clone())
                .unwrap_or_else(|| self.draft_id.clone());
            let partial = document.section_value(mutation.section)?;
            (document_id, partial)
        };

        preview::spawn_sync(self.preview.clone(), document_id, mutation.section, partial);

        if mutation.commit == CommitPolicy::Immediate {
            self.commit_inner(Some(mutation.section)).await?;
        }

        Ok(())
    }

    /// Commit the current document durably
    pub async fn commit_current(&self) -> Result<CommitOutcome> {
        self.commit_inner(None).await
    }

    async fn commit_inner(&self, section: Option<SectionId>) -> Result<CommitOutcome> {
        self.inflight.fetch_add(1, Ordering::SeqCst);
        // Queue point: a second commit waits here and only then snapshots
        // the draft, so it sees the identity the first commit assigned.
        // The guard is held through rollback/adoption below.
        let _guard = self.commit_lock.lock().await;

        let document = {
            let mut draft = self.draft.lock().expect("draft lock");
            // Open an edit window even for a commit with no prior edits, so
            // a failure always has a rollback target
            draft.snapshot();
            draft.document().clone()
        };

        let result = self.gateway.commit(&self.draft_id, &document).await;
        self.inflight.fetch_sub(1, Ordering::SeqCst);

        match result {
            Ok(outcome) => {
                {
                    let mut draft = self.draft.lock().expect("draft lock");
                    if draft.document().durable_id().is_none() {
                        draft.adopt_identity(outcome.identity.clone());
                    }
                    draft.clear_pin();
                }
                *self.last_error.lock().expect("error lock") = None;
                self.notifier.notify(Notification::success(
                    section,
                    match section {
                        Some(s) => format!("{s} committed durably"),
                        None => "Profile committed durably".to_string(),
                    },
                ));
                Ok(outcome)
            }
            Err(e) => {
                {
                    let mut draft = self.draft.lock().expect("draft lock");
                    if let Some(pin) = draft.pinned().cloned() {
                        draft.rollback(pin);
                    }
                }
                let message = e.to_string();
                *self.last_error.lock().expect("error lock") = Some(message.clone());
                self.notifier.notify(Notification::error(
                    section,
                    match section {
                        Some(s) => format!("Saving {s} failed, changes reverted: {message}"),
                        None => format!("Commit failed, changes reverted: {message}"),
                    },
                ));
                Err(e)
            }
        }
    }

    // ==================== Durable record surface ====================

    /// Rebuild the draft from a durable record.
    ///
    /// Reads the registry slot, fetches the document body from the content
    /// store (digest-checked by the store client), and replaces the draft
    /// wholesale. The document keeps the shape it was committed at; the
    /// access gate still decides what the current entitlement may edit.
    pub async fn load(&self, identity: &DurableId) -> Result<()> {
        let record = self
            .registry
            .read(identity)
            .await?
            .ok_or_else(|| StudioError::RegistryRead(format!("no record for {identity}")))?;

        if record.summary.tombstone {
            return Err(StudioError::RegistryRead(format!(
                "record {identity} is retired"
            )));
        }

        let bytes = self.content.get(&record.content_ref).await?;
        let mut document: Document = serde_json::from_slice(&bytes)
            .map_err(|e| StudioError::CorruptRecord(e.to_string()))?;
        document.set_durable_id(record.identity);

        let mut draft = self.draft.lock().expect("draft lock");
        draft.replace(document);
        Ok(())
    }

    /// Retire the durable record: the explicit delete/burn commit.
    ///
    /// On success the draft is reset to a fresh empty document at the
    /// current tier. Requires a durable identity.
    pub async fn retire(&self) -> Result<CommitOutcome> {
        self.inflight.fetch_add(1, Ordering::SeqCst);
        let _guard = self.commit_lock.lock().await;

        let document = self.current_document();
        let result = self.gateway.retire(&document).await;
        self.inflight.fetch_sub(1, Ordering::SeqCst);

        match result {
            Ok(outcome) => {
                {
                    let mut draft = self.draft.lock().expect("draft lock");
                    draft.replace(Document::new(self.resolver.current_tier()));
                }
                *self.last_error.lock().expect("error lock") = None;
                self.notifier
                    .notify(Notification::success(None, "Profile retired"));
                Ok(outcome)
            }
            Err(e) => {
                let message = e.to_string();
                *self.last_error.lock().expect("error lock") = Some(message.clone());
                self.notifier.notify(Notification::error(
                    None,
                    format!("Retiring failed: {message}"),
                ));
                Err(e)
            }
        }
    }
}

impl Drop for StudioSession {
    fn drop(&mut self) {
        if let Ok(mut watcher) = self.watcher.lock() {
            if let Some(task) = watcher.take() {
                task.abort();
            }
        }
    }
}

/// Consume ledger change events: re-resolve the entitlement and reshape the
/// draft when the tier moved. An upgrade keeps everything already entered
/// and adds empty extension blocks; a downgrade drops the sections the new
/// tier cannot carry and is announced, never silent.
async fn ledger_watch_loop(
    session: Weak<StudioSession>,
    mut events: tokio::sync::mpsc::Receiver<crate::traits::LedgerEvent>,
) {
    while let Some(event) = events.recv().await {
        let Some(session) = session.upgrade() else {
            break;
        };

        tracing::debug!(event = ?event, "Ledger change, re-resolving tier");
        let entitlement = session.resolver.refresh().await;

        let old_tier = {
            let mut draft = session.draft.lock().expect("draft lock");
            let old_tier = draft.document().tier();
            if old_tier != entitlement.tier {
                draft.reshape_tier(entitlement.tier);
            }
            old_tier
        };

        if old_tier != entitlement.tier {
            let message = if entitlement.tier > old_tier {
                format!("Entitlement upgraded: {old_tier} -> {}", entitlement.tier)
            } else {
                format!(
                    "Entitlement downgraded: {old_tier} -> {}; locked sections were removed",
                    entitlement.tier
                )
            };
            session.notifier.notify(Notification::success(None, message));
        }
    }
    tracing::debug!("Ledger event stream closed");
}
