//! In-memory fake collaborators for session and gateway tests
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use toque_sdk::{
    Collaborators, ContentRef, ContentStore, DurableId, DurableRegistry, EntitlementLedger,
    LedgerEvent, Notification, NotificationSink, OwnershipSignals, PendingWrite, PreviewSink,
    RecordSummary, Result, SectionId, SessionConfig, StoredRecord, StudioError, StudioSession,
    WriteConfirmation,
};

// ============================================================================
// Ledger
// ============================================================================

#[derive(Default)]
pub struct FakeLedger {
    signals: Mutex<OwnershipSignals>,
    fail_reads: AtomicBool,
    subscribers: Mutex<Vec<mpsc::Sender<LedgerEvent>>>,
}

impl FakeLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_signals(signals: OwnershipSignals) -> Arc<Self> {
        let ledger = Self::new();
        *ledger.signals.lock().unwrap() = signals;
        ledger
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Update signals and deliver a mint event to every subscriber
    pub fn mint(&self, token_id: &str, signals: OwnershipSignals) {
        *self.signals.lock().unwrap() = signals;
        self.emit(LedgerEvent::Minted {
            token_id: token_id.to_string(),
        });
    }

    /// Update signals and deliver a burn event to every subscriber
    pub fn burn(&self, token_id: &str, signals: OwnershipSignals) {
        *self.signals.lock().unwrap() = signals;
        self.emit(LedgerEvent::Burned {
            token_id: token_id.to_string(),
        });
    }

    fn emit(&self, event: LedgerEvent) {
        let subscribers = self.subscribers.lock().unwrap();
        for tx in subscribers.iter() {
            let _ = tx.try_send(event.clone());
        }
    }
}

#[async_trait]
impl EntitlementLedger for FakeLedger {
    async fn get_entitlement(&self, _account: &str) -> Result<OwnershipSignals> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StudioError::EntitlementRead("ledger unavailable".into()));
        }
        Ok(self.signals.lock().unwrap().clone())
    }

    fn subscribe(&self, _account: &str) -> mpsc::Receiver<LedgerEvent> {
        let (tx, rx) = mpsc::channel(8);
        self.subscribers.lock().unwrap().push(tx);
        rx
    }
}

// ============================================================================
// Content store
// ============================================================================

#[derive(Default)]
pub struct FakeContentStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    fail_puts: AtomicBool,
    put_count: AtomicUsize,
}

impl FakeContentStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub fn put_count(&self) -> usize {
        self.put_count.load(Ordering::SeqCst)
    }

    pub fn blob(&self, content_ref: &str) -> Option<Vec<u8>> {
        self.blobs.lock().unwrap().get(content_ref).cloned()
    }
}

#[async_trait]
impl ContentStore for FakeContentStore {
    async fn put(&self, _media_type: &str, bytes: &[u8]) -> Result<ContentRef> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(StudioError::UploadFailure {
                context: "content store".into(),
                reason: "store offline".into(),
            });
        }
        self.put_count.fetch_add(1, Ordering::SeqCst);
        // Content-addressed: identical bytes always land on the same ref
        let content_ref = toque_registry_client::content_ref_for(bytes);
        self.blobs
            .lock()
            .unwrap()
            .insert(content_ref.clone(), bytes.to_vec());
        Ok(ContentRef(content_ref))
    }

    async fn get(&self, content_ref: &ContentRef) -> Result<Vec<u8>> {
        self.blobs
            .lock()
            .unwrap()
            .get(&content_ref.0)
            .cloned()
            .ok_or_else(|| StudioError::RegistryRead(format!("no blob {content_ref}")))
    }
}

// ============================================================================
// Registry
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegistryMode {
    #[default]
    Normal,
    /// Reject the write before a transaction exists
    RejectWrite,
    /// Accept the write, fail at confirmation
    FailConfirm,
    /// Accept the write, never confirm (forces the timeout path)
    HangConfirm,
}

#[derive(Clone)]
struct PendingTx {
    identity: String,
    content_ref: String,
    summary: RecordSummary,
}

#[derive(Default)]
pub struct FakeRegistry {
    records: Mutex<HashMap<String, (String, RecordSummary)>>,
    pending: Mutex<HashMap<String, PendingTx>>,
    mode: Mutex<RegistryMode>,
    confirm_delay: Mutex<Duration>,
    next_id: AtomicUsize,
    write_count: AtomicUsize,
    /// Concurrency probe: write..confirm spans open right now, and the most
    /// that were ever open at once
    open_spans: AtomicUsize,
    max_open_spans: AtomicUsize,
}

impl FakeRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_mode(&self, mode: RegistryMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn set_confirm_delay(&self, delay: Duration) {
        *self.confirm_delay.lock().unwrap() = delay;
    }

    pub fn write_count(&self) -> usize {
        self.write_count.load(Ordering::SeqCst)
    }

    pub fn max_open_spans(&self) -> usize {
        self.max_open_spans.load(Ordering::SeqCst)
    }

    pub fn record(&self, identity: &str) -> Option<(String, RecordSummary)> {
        self.records.lock().unwrap().get(identity).cloned()
    }
}

#[async_trait]
impl DurableRegistry for FakeRegistry {
    async fn write(
        &self,
        identity: Option<&DurableId>,
        content_ref: &ContentRef,
        summary: RecordSummary,
    ) -> Result<PendingWrite> {
        if *self.mode.lock().unwrap() == RegistryMode::RejectWrite {
            return Err(StudioError::RegistryWriteFailure("write rejected".into()));
        }

        self.write_count.fetch_add(1, Ordering::SeqCst);
        let open = self.open_spans.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_open_spans.fetch_max(open, Ordering::SeqCst);

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let identity = identity
            .map(|d| d.0.clone())
            .unwrap_or_else(|| format!("rec-{id}"));
        let transaction_id = format!("tx-{id}");

        self.pending.lock().unwrap().insert(
            transaction_id.clone(),
            PendingTx {
                identity,
                content_ref: content_ref.0.clone(),
                summary,
            },
        );

        Ok(PendingWrite { transaction_id })
    }

    async fn confirm(&self, transaction_id: &str) -> Result<WriteConfirmation> {
        let delay = *self.confirm_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mode = *self.mode.lock().unwrap();
        match mode {
            RegistryMode::HangConfirm => {
                // Never resolves inside any sane test timeout
                tokio::time::sleep(Duration::from_secs(3600)).await;
                unreachable!("hung confirmation should have been timed out");
            }
            RegistryMode::FailConfirm => {
                self.pending.lock().unwrap().remove(transaction_id);
                self.open_spans.fetch_sub(1, Ordering::SeqCst);
                Err(StudioError::RegistryWriteFailure(
                    "transaction reverted".into(),
                ))
            }
            _ => {
                let tx = self
                    .pending
                    .lock()
                    .unwrap()
                    .remove(transaction_id)
                    .ok_or_else(|| {
                        StudioError::RegistryWriteFailure(format!(
                            "unknown transaction {transaction_id}"
                        ))
                    })?;
                self.records
                    .lock()
                    .unwrap()
                    .insert(tx.identity.clone(), (tx.content_ref, tx.summary));
                self.open_spans.fetch_sub(1, Ordering::SeqCst);
                Ok(WriteConfirmation {
                    identity: DurableId(tx.identity),
                })
            }
        }
    }

    async fn read(&self, identity: &DurableId) -> Result<Option<StoredRecord>> {
        let records = self.records.lock().unwrap();
        Ok(records.get(&identity.0).map(|(content_ref, summary)| {
            StoredRecord {
                identity: identity.clone(),
                content_ref: ContentRef(content_ref.clone()),
                summary: summary.clone(),
            }
        }))
    }
}

// ============================================================================
// Preview and notifications
// ============================================================================

#[derive(Default)]
pub struct FakePreview {
    pub calls: Mutex<Vec<(String, SectionId)>>,
    fail: AtomicBool,
}

impl FakePreview {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl PreviewSink for FakePreview {
    async fn sync(
        &self,
        document_id: &str,
        section: SectionId,
        _partial: serde_json::Value,
    ) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(StudioError::PreviewSync("mirror offline".into()));
        }
        self.calls
            .lock()
            .unwrap()
            .push((document_id.to_string(), section));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeNotifier {
    pub notifications: Mutex<Vec<Notification>>,
}

impl FakeNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn messages(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }
}

impl NotificationSink for FakeNotifier {
    fn notify(&self, notification: Notification) {
        self.notifications.lock().unwrap().push(notification);
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub ledger: Arc<FakeLedger>,
    pub content: Arc<FakeContentStore>,
    pub registry: Arc<FakeRegistry>,
    pub preview: Arc<FakePreview>,
    pub notifier: Arc<FakeNotifier>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            ledger: FakeLedger::new(),
            content: FakeContentStore::new(),
            registry: FakeRegistry::new(),
            preview: FakePreview::new(),
            notifier: FakeNotifier::new(),
        }
    }

    pub fn with_signals(signals: OwnershipSignals) -> Self {
        let harness = Self::new();
        *harness.ledger.signals.lock().unwrap() = signals;
        harness
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            ledger: self.ledger.clone(),
            content: self.content.clone(),
            registry: self.registry.clone(),
            preview: self.preview.clone(),
            notifier: self.notifier.clone(),
        }
    }

    pub async fn open_session(&self, account: &str) -> Arc<StudioSession> {
        StudioSession::open(account, self.collaborators(), SessionConfig::default()).await
    }

    pub async fn open_session_with_timeout(
        &self,
        account: &str,
        confirm_timeout: Duration,
    ) -> Arc<StudioSession> {
        StudioSession::open(
            account,
            self.collaborators(),
            SessionConfig { confirm_timeout },
        )
        .await
    }
}

/// Signals for a Pro account
pub fn pro_signals() -> OwnershipSignals {
    OwnershipSignals {
        owns_pro: true,
        token_ids: vec!["pro-1".into()],
        ..Default::default()
    }
}

/// Signals for a Group account
pub fn group_signals() -> OwnershipSignals {
    OwnershipSignals {
        owns_pro: true,
        owns_group: true,
        token_ids: vec!["pro-1".into(), "group-1".into()],
        ..Default::default()
    }
}
