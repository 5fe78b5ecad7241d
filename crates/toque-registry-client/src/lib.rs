//! Rust client for the Toque durable registry, entitlement ledger, and
//! content-addressable blob store.
//!
//! Three external collaborators live behind one HTTP surface:
//! - **Registry**: single mutable slot per record identity; writes are
//!   asynchronous transactions, confirmed or failed after the fact
//! - **Ledger**: read-only ownership signals for entitlement tokens
//! - **Content store**: idempotent blob storage keyed by content hash
//!
//! This crate is transport only. Tier precedence, access gating, drafts, and
//! commit sequencing live in `toque-sdk`, which wraps these clients behind
//! its collaborator traits.

mod client;
mod content;
mod error;
mod types;

pub use client::RegistryClient;
pub use content::{content_ref_for, sha256_hex, ContentStoreClient};
pub use error::{RegistryClientError, Result};
pub use types::{
    EntitlementResponse, PutBlobResponse, RecordFields, RegistryConfig, RegistryRecord,
    TransactionState, TransactionStatusResponse, WriteRecordRequest, WriteRecordResponse,
};
