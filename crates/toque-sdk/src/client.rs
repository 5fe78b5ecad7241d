//! HTTP collaborator adapters
//!
//! Wraps `toque-registry-client` behind the SDK's collaborator traits, so
//! the engine itself never sees a wire format. Everything here is transport
//! adaptation; semantics live in the engine modules.

use crate::document::{ContentRef, DurableId};
use crate::error::{Result, StudioError};
use crate::preview::PreviewWarmer;
use crate::session::Collaborators;
use crate::tier::{OwnershipSignals, Tier};
use crate::traits::{
    ContentStore, DurableRegistry, EntitlementLedger, LedgerEvent, LogNotifier, PendingWrite,
    RecordSummary, StoredRecord, WriteConfirmation,
};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use toque_registry_client::{ContentStoreClient, RecordFields, RegistryClient, RegistryConfig};

/// Entitlement ledger over the registry-client HTTP API.
///
/// `subscribe` is poll-based: the underlying client re-reads ownership
/// signals at an interval, and this adapter diffs token sets to synthesize
/// mint/burn events.
pub struct HttpLedger {
    inner: Arc<RegistryClient>,
    poll_interval: Duration,
}

impl HttpLedger {
    pub fn new(inner: Arc<RegistryClient>) -> Self {
        Self {
            inner,
            poll_interval: Duration::from_secs(15),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

#[async_trait]
impl EntitlementLedger for HttpLedger {
    async fn get_entitlement(&self, account: &str) -> Result<OwnershipSignals> {
        let response = self
            .inner
            .get_entitlement(account)
            .await
            .map_err(|e| StudioError::EntitlementRead(e.to_string()))?;

        Ok(OwnershipSignals {
            owns_pro: response.owns_pro,
            owns_group: response.owns_group,
            owns_og: response.owns_og,
            token_ids: response.token_ids,
        })
    }

    fn subscribe(&self, account: &str) -> mpsc::Receiver<LedgerEvent> {
        let (tx, rx) = mpsc::channel(8);
        let mut source = self
            .inner
            .clone()
            .watch_entitlements(account, self.poll_interval);

        tokio::spawn(async move {
            // The first snapshot is initial state, not a change
            let mut known: Option<HashSet<String>> = None;

            while let Some(signals) = source.recv().await {
                let tokens: HashSet<String> = signals.token_ids.iter().cloned().collect();
                if let Some(prev) = &known {
                    for token_id in tokens.difference(prev) {
                        let event = LedgerEvent::Minted {
                            token_id: token_id.clone(),
                        };
                        if tx.send(event).await.is_err() {
                            return;
                        }
                    }
                    for token_id in prev.difference(&tokens) {
                        let event = LedgerEvent::Burned {
                            token_id: token_id.clone(),
                        };
                        if tx.send(event).await.is_err() {
                            return;
                        }
                    }
                }
                known = Some(tokens);
            }
        });

        rx
    }
}

/// Content-addressable store over the registry-client HTTP API
pub struct HttpContentStore {
    inner: Arc<ContentStoreClient>,
}

impl HttpContentStore {
    pub fn new(inner: Arc<ContentStoreClient>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl ContentStore for HttpContentStore {
    async fn put(&self, media_type: &str, bytes: &[u8]) -> Result<ContentRef> {
        let content_ref = self
            .inner
            .put(media_type, bytes)
            .await
            .map_err(|e| StudioError::UploadFailure {
                context: "content store".to_string(),
                reason: e.to_string(),
            })?;
        Ok(ContentRef(content_ref))
    }

    async fn get(&self, content_ref: &ContentRef) -> Result<Vec<u8>> {
        self.inner
            .get(&content_ref.0)
            .await
            .map_err(|e| StudioError::RegistryRead(e.to_string()))
    }
}

/// Durable registry over the registry-client HTTP API
pub struct HttpRegistry {
    inner: Arc<RegistryClient>,
}

impl HttpRegistry {
    pub fn new(inner: Arc<RegistryClient>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl DurableRegistry for HttpRegistry {
    async fn write(
        &self,
        identity: Option<&DurableId>,
        content_ref: &ContentRef,
        summary: RecordSummary,
    ) -> Result<PendingWrite> {
        let fields = RecordFields {
            tier: summary.tier.as_str().to_string(),
            display_name: summary.display_name,
            tombstone: summary.tombstone,
        };

        let response = self
            .inner
            .write_record(identity.map(|id| id.0.as_str()), &content_ref.0, fields)
            .await
            .map_err(|e| StudioError::RegistryWriteFailure(e.to_string()))?;

        Ok(PendingWrite {
            transaction_id: response.transaction_id,
        })
    }

    async fn confirm(&self, transaction_id: &str) -> Result<WriteConfirmation> {
        let status = self
            .inner
            .wait_for_transaction(transaction_id)
            .await
            .map_err(|e| StudioError::RegistryWriteFailure(e.to_string()))?;

        let identity = status.identity.ok_or_else(|| {
            StudioError::RegistryWriteFailure(format!(
                "transaction {transaction_id} confirmed without an identity"
            ))
        })?;

        Ok(WriteConfirmation {
            identity: DurableId(identity),
        })
    }

    async fn read(&self, identity: &DurableId) -> Result<Option<StoredRecord>> {
        let record = self
            .inner
            .get_record(&identity.0)
            .await
            .map_err(|e| StudioError::RegistryRead(e.to_string()))?;

        Ok(record.map(|r| StoredRecord {
            identity: DurableId(r.identity),
            content_ref: ContentRef(r.content_ref),
            summary: RecordSummary {
                tier: Tier::from_str(&r.fields.tier).unwrap_or(Tier::Free),
                display_name: r.fields.display_name,
                tombstone: r.fields.tombstone,
            },
        }))
    }
}

impl Collaborators {
    /// Wire every collaborator to its HTTP implementation.
    ///
    /// One registry-client config serves the ledger, registry, and content
    /// store; the preview warmer gets its own URL since the mirror is a
    /// separate, non-authoritative service.
    pub fn http(config: RegistryConfig, preview_url: impl Into<String>) -> Self {
        let registry_client = Arc::new(RegistryClient::new(config.clone()));
        let content_client = Arc::new(ContentStoreClient::new(config));

        Self {
            ledger: Arc::new(HttpLedger::new(registry_client.clone())),
            content: Arc::new(HttpContentStore::new(content_client)),
            registry: Arc::new(HttpRegistry::new(registry_client)),
            preview: Arc::new(PreviewWarmer::new(preview_url)),
            notifier: Arc::new(LogNotifier),
        }
    }
}
