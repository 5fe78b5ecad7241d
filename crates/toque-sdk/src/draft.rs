//! Draft store: the canonical in-memory document with snapshot and rollback
//!
//! All operations are synchronous; the store never suspends. The optimistic
//! apply therefore always completes before any async preview or commit work
//! is scheduled, and the UI never lags behind input.
//!
//! Rollback is whole-document: several optimistic edits may accumulate
//! between successful commits, so the pinned snapshot is taken at the first
//! edit of the window and restoring it rewinds every edit since, not just
//! the one that happened to be in flight when a commit failed.

use crate::document::{Document, DurableId, Mutation};
use crate::error::Result;
use crate::tier::Tier;

/// An immutable deep copy of the document, used for rollback
#[derive(Debug, Clone, PartialEq)]
pub struct DraftSnapshot {
    document: Document,
    revision: u64,
}

impl DraftSnapshot {
    /// The captured document
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Revision the snapshot was taken at
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

/// Holds the canonical in-memory document plus a pinned snapshot buffer
#[derive(Debug)]
pub struct DraftStore {
    document: Document,
    revision: u64,
    pin: Option<DraftSnapshot>,
}

impl DraftStore {
    /// Create a store around a document
    pub fn new(document: Document) -> Self {
        Self {
            document,
            revision: 0,
            pin: None,
        }
    }

    /// The current document
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Monotonic revision, bumped on every state change. Reactive views
    /// re-render when the revision moves.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Pin a snapshot for the current edit window.
    ///
    /// The first call of a window captures the document; later calls return
    /// the same pin unchanged, so rolling back restores the state before the
    /// *first* edit since the last successful commit, not the latest one.
    pub fn snapshot(&mut self) -> DraftSnapshot {
        if self.pin.is_none() {
            self.pin = Some(DraftSnapshot {
                document: self.document.clone(),
                revision: self.revision,
            });
        }
        self.pin.clone().expect("pin was just set")
    }

    /// The currently pinned snapshot, if an edit window is open
    pub fn pinned(&self) -> Option<&DraftSnapshot> {
        self.pin.as_ref()
    }

    /// Discard the pin after a successful commit; the next edit opens a
    /// fresh window.
    pub fn clear_pin(&mut self) {
        self.pin = None;
    }

    /// Apply a mutation in place. A rejected mutation changes nothing.
    pub fn apply(&mut self, mutation: &Mutation) -> Result<&Document> {
        self.document.apply(mutation)?;
        self.revision += 1;
        Ok(&self.document)
    }

    /// Replace the whole document from a snapshot and discard the pin.
    pub fn rollback(&mut self, snapshot: DraftSnapshot) {
        self.document = snapshot.document;
        self.pin = None;
        self.revision += 1;
    }

    /// Record the registry identity after a confirmed commit
    pub fn adopt_identity(&mut self, id: DurableId) {
        self.document.set_durable_id(id);
        self.revision += 1;
    }

    /// Reshape the document for a new tier, keeping everything the new tier
    /// can hold. Used when the resolved entitlement changes mid-session.
    pub fn reshape_tier(&mut self, tier: Tier) {
        if self.document.tier() == tier {
            return;
        }
        let document = std::mem::replace(&mut self.document, Document::new(Tier::Free));
        self.document = document.at_tier(tier);
        self.revision += 1;
    }

    /// Replace the document wholesale (load path)
    pub fn replace(&mut self, document: Document) {
        self.document = document;
        self.pin = None;
        self.revision += 1;
    }
}
