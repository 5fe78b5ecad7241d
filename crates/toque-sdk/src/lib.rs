//! Toque SDK - tier-gated profile studio engine
//!
//! The engine behind the multi-step profile studio: documents whose editable
//! sections depend on an entitlement tier, edited optimistically in memory
//! and persisted through a registry transaction backed by content-addressable
//! storage.
//!
//! # Architecture
//!
//! - **TierResolver** derives the tier from entitlement-token ownership on an
//!   external ledger (highest wins, re-resolved on mint/burn events)
//! - **StepCatalog** / **AccessGate** decide which steps a tier unlocks
//! - **DraftStore** holds the canonical in-memory document with snapshot and
//!   whole-document rollback
//! - **PreviewChannel** mirrors sections to a non-authoritative renderer,
//!   fire-and-forget
//! - **CommitGateway** serializes durable writes per document identity:
//!   content upload, one registry transaction, bounded confirmation
//! - **StudioSession** is the explicit handle wiring it all together - no
//!   ambient global
//!
//! # Example
//!
//! ```rust,ignore
//! use toque_sdk::{Collaborators, Mutation, SectionId, SessionConfig, StudioSession};
//! use toque_registry_client::RegistryConfig;
//!
//! let session = StudioSession::open(
//!     "acct:chef-amelie",
//!     Collaborators::http(RegistryConfig::default(), "https://preview.example.com"),
//!     SessionConfig::default(),
//! )
//! .await;
//!
//! session
//!     .apply_mutation(Mutation::add(
//!         SectionId::Recipes,
//!         serde_json::json!({"title": "Sourdough", "ingredients": []}),
//!     ))
//!     .await?;
//!
//! let outcome = session.commit_current().await?;
//! println!("registered as {}", outcome.identity);
//! ```

// Step-level access control
pub mod access;

// Commit gateway and records
pub mod commit;

// Document model and mutations
pub mod document;

// Draft store with snapshot/rollback
pub mod draft;

// Error types
pub mod error;

// Preview channel (best-effort mirror)
pub mod preview;

// Session handle and mutation pipeline
pub mod session;

// Step catalog
pub mod steps;

// Tiers and tier resolution
pub mod tier;

// Collaborator traits
pub mod traits;

// HTTP collaborator adapters
#[cfg(feature = "client")]
pub mod client;

// Re-export the session surface
pub use session::{Collaborators, SessionConfig, StudioSession};

// Re-export the domain model
pub use document::{
    BasicsPatch, BlobField, CommitPolicy, ContentRef, Document, DurableId, Mutation, MutationOp,
    SectionId,
};

// Re-export gating types
pub use access::AccessGate;
pub use steps::{StepCatalog, StepDescriptor, FREE_STEP_LIMIT};
pub use tier::{OwnershipSignals, Tier, TierEntitlement, TierResolver};

// Re-export commit types
pub use commit::{CommitConfig, CommitGateway, CommitOutcome, CommitRecord, CommitStatus};

// Re-export draft types
pub use draft::{DraftSnapshot, DraftStore};

// Re-export collaborator seams
pub use preview::PreviewSink;
pub use traits::{
    ContentStore, DurableRegistry, EntitlementLedger, LedgerEvent, LogNotifier, Notification,
    NotificationKind, NotificationSink, PendingWrite, RecordSummary, StoredRecord,
    WriteConfirmation,
};

// Re-export error types
pub use error::{Result, StudioError};

// Re-export HTTP adapters
#[cfg(feature = "client")]
pub use client::{HttpContentStore, HttpLedger, HttpRegistry};

#[cfg(feature = "client")]
pub use preview::PreviewWarmer;
