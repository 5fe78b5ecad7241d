//! Content-addressable blob store client
//!
//! Uploads are keyed by the hash of their bytes, so a `put` is idempotent:
//! re-uploading identical content lands on the same reference. The reference
//! is an IPFS-compatible CIDv1 over a SHA-256 multihash, computed client-side
//! and verified against what the server reports.

use crate::error::{RegistryClientError, Result};
use crate::types::{PutBlobResponse, RegistryConfig};
use cid::Cid;
use multihash_codetable::{Code, MultihashDigest};
use reqwest::{header, Client, StatusCode};
use sha2::{Digest, Sha256};
use std::time::Duration;

/// Raw codec for CIDv1 (plain bytes, no IPLD structure)
const RAW_CODEC: u64 = 0x55;

/// Compute the content reference for a byte string.
///
/// CIDv1, raw codec, SHA-256 multihash. Identical bytes always produce the
/// same reference.
pub fn content_ref_for(bytes: &[u8]) -> String {
    let hash = Code::Sha2_256.digest(bytes);
    Cid::new_v1(RAW_CODEC, hash).to_string()
}

/// Compute the bare SHA-256 hex digest of a byte string.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// HTTP client for the content-addressable blob store
///
/// # Example
///
/// ```rust,no_run
/// use toque_registry_client::{ContentStoreClient, RegistryConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = ContentStoreClient::new(RegistryConfig {
///     base_url: "http://localhost:8080".into(),
///     ..Default::default()
/// });
///
/// let content_ref = client.put("image/png", b"...png bytes...").await?;
/// let bytes = client.get(&content_ref).await?;
/// # Ok(())
/// # }
/// ```
pub struct ContentStoreClient {
    config: RegistryConfig,
    client: Client,
}

impl ContentStoreClient {
    /// Create a new content store client
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

    /// Upload a blob and return its content reference.
    ///
    /// The reference is computed locally before the upload; the server stores
    /// the bytes under that address. A repeated `put` of the same bytes is a
    /// no-op on the server and returns the same reference.
    pub async fn put(&self, media_type: &str, bytes: &[u8]) -> Result<String> {
        let content_ref = content_ref_for(bytes);
        let url = format!(
            "{}/content/v1/blobs/{}",
            self.config.base_url, content_ref
        );

        let response = self
            .client
            .put(&url)
            .header(header::CONTENT_TYPE, media_type)
            .body(bytes.to_vec())
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(RegistryClientError::Server { status, message });
        }

        let body: PutBlobResponse = response.json().await?;
        if body.content_ref != content_ref {
            return Err(RegistryClientError::InvalidResponse(format!(
                "server stored blob under {} but local address is {}",
                body.content_ref, content_ref
            )));
        }

        Ok(content_ref)
    }

    /// Fetch a blob by content reference.
    ///
    /// The returned bytes are re-hashed and checked against the reference, so
    /// a corrupt or substituted response is rejected.
    pub async fn get(&self, content_ref: &str) -> Result<Vec<u8>> {
        let url = format!(
            "{}/content/v1/blobs/{}",
            self.config.base_url,
            urlencoding::encode(content_ref)
        );

        let response = self.client.get(&url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(RegistryClientError::NotFound(content_ref.to_string()));
        }
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(RegistryClientError::Server { status, message });
        }

        let bytes = response.bytes().await?.to_vec();
        let actual = content_ref_for(&bytes);
        if actual != content_ref {
            return Err(RegistryClientError::DigestMismatch {
                content_ref: content_ref.to_string(),
                actual,
            });
        }

        Ok(bytes)
    }
}
