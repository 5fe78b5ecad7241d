//! HTTP client for the Toque durable registry and entitlement ledger

use crate::error::{RegistryClientError, Result};
use crate::types::*;
use reqwest::{header, Client, StatusCode};
use std::time::Duration;
use tokio::sync::mpsc;

/// HTTP client for the durable registry and entitlement ledger
///
/// The registry is a single mutable slot per record identity: a write replaces
/// the slot's content reference, and confirmation is asynchronous. The ledger
/// side is read-only ownership signals for entitlement tokens.
///
/// # Example
///
/// ```rust,no_run
/// use toque_registry_client::{RegistryClient, RegistryConfig, RecordFields};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = RegistryClient::new(RegistryConfig {
///     base_url: "http://localhost:8080".into(),
///     realm: "toque".into(),
///     ..Default::default()
/// });
///
/// // Read ownership signals for an account
/// let signals = client.get_entitlement("acct:chef-amelie").await?;
///
/// // Write a record and wait for confirmation
/// let pending = client
///     .write_record(None, "bafkrei...", RecordFields::default())
///     .await?;
/// let status = client.wait_for_transaction(&pending.transaction_id).await?;
/// # Ok(())
/// # }
/// ```
pub struct RegistryClient {
    config: RegistryConfig,
    client: Client,
}

impl RegistryClient {
    /// Create a new registry client
    pub fn new(config: RegistryConfig) -> Self {
        let mut headers = header::HeaderMap::new();
        if let Some(ref api_key) = config.api_key {
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(&format!("Bearer {}", api_key))
                    .expect("Invalid API key"),
            );
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to build HTTP client");

        Self { config, client }
    }

    /// Get the client configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    // ==================== Registry API ====================

    /// Submit a record write.
    ///
    /// Pass `identity = None` to claim a new slot; the confirmed transaction
    /// carries the assigned identity. The write is durable only once the
    /// returned transaction confirms.
    pub async fn write_record(
        &self,
        identity: Option<&str>,
        content_ref: &str,
        fields: RecordFields,
    ) -> Result<WriteRecordResponse> {
        let url = format!(
            "{}/registry/v1/{}/records",
            self.config.base_url, self.config.realm
        );

        let body = WriteRecordRequest {
            identity: identity.map(|s| s.to_string()),
            content_ref: content_ref.to_string(),
            fields,
        };

        let response = self.client.post(&url).json(&body).send().await?;
        self.handle_response(response).await
    }

    /// Get the current status of a transaction
    pub async fn get_transaction(&self, transaction_id: &str) -> Result<TransactionStatusResponse> {
        let url = format!(
            "{}/registry/v1/{}/transactions/{}",
            self.config.base_url,
            self.config.realm,
            urlencoding::encode(transaction_id)
        );

        let response = self.client.get(&url).send().await?;
        self.handle_response(response).await
    }

    /// Poll a transaction until it reaches a terminal state.
    ///
    /// Resolves with the confirmed status, or an error when the registry
    /// rejected the write. The caller bounds the overall wait; this method
    /// polls indefinitely at the configured interval.
    pub async fn wait_for_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<TransactionStatusResponse> {
        let interval = Duration::from_millis(self.config.poll_interval_ms);

        loop {
            let status = self.get_transaction(transaction_id).await?;
            match status.status {
                TransactionState::Confirmed => return Ok(status),
                TransactionState::Failed => {
                    return Err(RegistryClientError::TransactionRejected {
                        transaction_id: transaction_id.to_string(),
                        reason: status
                            .error
                            .unwrap_or_else(|| "no reason given".to_string()),
                    });
                }
                TransactionState::Pending => {
                    tokio::time::sleep(interval).await;
                }
            }
        }
    }

    /// Read a record by identity. Returns `None` for an unclaimed slot.
    pub async fn get_record(&self, identity: &str) -> Result<Option<RegistryRecord>> {
        let url = format!(
            "{}/registry/v1/{}/records/{}",
            self.config.base_url,
            self.config.realm,
            urlencoding::encode(identity)
        );

        let response = self.client.get(&url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(RegistryClientError::Server { status, message });
        }

        let record: RegistryRecord = response.json().await?;
        Ok(Some(record))
    }

    // ==================== Ledger API ====================

    /// Read ownership signals for an account
    pub async fn get_entitlement(&self, account: &str) -> Result<EntitlementResponse> {
        let url = format!(
            "{}/ledger/v1/entitlements/{}",
            self.config.base_url,
            urlencoding::encode(account)
        );

        let response = self.client.get(&url).send().await?;
        self.handle_response(response).await
    }

    /// Watch an account's entitlements for changes.
    ///
    /// Spawns a polling task that re-reads the ledger at the given interval
    /// and emits the new signals whenever they differ from the last read.
    /// Dropping the receiver stops the task. Read errors are logged and the
    /// poll continues; the ledger being down is not an event.
    pub fn watch_entitlements(
        self: std::sync::Arc<Self>,
        account: &str,
        interval: Duration,
    ) -> mpsc::Receiver<EntitlementResponse> {
        let (tx, rx) = mpsc::channel(8);
        let account = account.to_string();

        tokio::spawn(async move {
            let mut last: Option<EntitlementResponse> = None;

            loop {
                match self.get_entitlement(&account).await {
                    Ok(signals) => {
                        let changed = match &last {
                            Some(prev) => {
                                prev.owns_pro != signals.owns_pro
                                    || prev.owns_group != signals.owns_group
                                    || prev.owns_og != signals.owns_og
                            }
                            None => true,
                        };
                        if changed {
                            if tx.send(signals.clone()).await.is_err() {
                                break;
                            }
                            last = Some(signals);
                        }
                    }
                    Err(e) => {
                        tracing::warn!(account = %account, error = %e, "Entitlement poll failed");
                    }
                }
                tokio::time::sleep(interval).await;
            }
        });

        rx
    }

    // ==================== Helper Methods ====================

    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        if response.status() == StatusCode::NOT_FOUND {
            return Err(RegistryClientError::NotFound(
                "Resource not found".to_string(),
            ));
        }

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(RegistryClientError::Server { status, message });
        }

        let body = response.json().await?;
        Ok(body)
    }
}
