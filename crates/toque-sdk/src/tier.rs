//! Entitlement tiers and tier resolution
//!
//! A tier is derived from ownership of entitlement tokens on an external
//! ledger. Precedence is highest-wins, not additive: owning an OG token makes
//! the account OG even if it also owns Pro. The resolver caches the derived
//! entitlement and invalidates it on ledger change events; a ledger read
//! error degrades to Free and never blocks the caller.

use crate::traits::EntitlementLedger;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

/// Entitlement tiers from lowest to highest.
///
/// Each tier unlocks additional document sections on top of everything the
/// tiers below it unlock. Comparison follows the numeric order, so
/// `tier >= required_tier` is the access test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// No entitlement tokens - base sections only
    Free = 0,
    /// Pro token holder
    Pro = 1,
    /// Group (organization) token holder
    Group = 2,
    /// OG founding-member token holder (highest)
    Og = 3,
}

impl Tier {
    /// Parse from string representation
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "free" => Some(Self::Free),
            "pro" => Some(Self::Pro),
            "group" => Some(Self::Group),
            "og" => Some(Self::Og),
            _ => None,
        }
    }

    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Pro => "pro",
            Self::Group => "group",
            Self::Og => "og",
        }
    }

    /// Check if this tier satisfies a requirement
    pub fn satisfies(&self, required: Tier) -> bool {
        *self >= required
    }
}

impl Default for Tier {
    fn default() -> Self {
        Self::Free
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Raw ownership signals read from the entitlement ledger
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OwnershipSignals {
    /// Account owns a Pro entitlement token
    pub owns_pro: bool,
    /// Account owns a Group entitlement token
    pub owns_group: bool,
    /// Account owns an OG entitlement token
    pub owns_og: bool,
    /// Token IDs backing the signals above
    #[serde(default)]
    pub token_ids: Vec<String>,
}

impl OwnershipSignals {
    /// Derive the effective tier. Highest-wins, never additive.
    pub fn tier(&self) -> Tier {
        if self.owns_og {
            Tier::Og
        } else if self.owns_group {
            Tier::Group
        } else if self.owns_pro {
            Tier::Pro
        } else {
            Tier::Free
        }
    }
}

/// A derived entitlement: the effective tier plus the tokens it came from.
///
/// Derived state only - never stored on a document. The document records the
/// tier it was committed at; the entitlement is re-derived from the ledger.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TierEntitlement {
    /// Effective tier
    pub tier: Tier,
    /// Token IDs the tier was derived from (empty for Free)
    pub source_token_ids: Vec<String>,
}

/// Resolves an account's entitlement tier from the ledger.
///
/// The current tier is published on a `watch` channel so step catalogs and
/// gates recompute reactively. `resolve` is the only way the effective tier
/// changes; a mid-edit downgrade is therefore always an explicit,
/// observable event on the channel, never a silent one.
pub struct TierResolver {
    ledger: Arc<dyn EntitlementLedger>,
    account: String,
    cached: Mutex<Option<TierEntitlement>>,
    tier_tx: watch::Sender<Tier>,
}

impl TierResolver {
    /// Create a resolver for an account. Starts at Free until first resolve.
    pub fn new(ledger: Arc<dyn EntitlementLedger>, account: impl Into<String>) -> Self {
        let (tier_tx, _) = watch::channel(Tier::Free);
        Self {
            ledger,
            account: account.into(),
            cached: Mutex::new(None),
            tier_tx,
        }
    }

    /// The account this resolver reads entitlements for
    pub fn account(&self) -> &str {
        &self.account
    }

    /// Subscribe to tier changes
    pub fn watch_tier(&self) -> watch::Receiver<Tier> {
        self.tier_tx.subscribe()
    }

    /// The last resolved tier (Free before the first resolve)
    pub fn current_tier(&self) -> Tier {
        *self.tier_tx.borrow()
    }

    /// Resolve the account's entitlement from the ledger.
    ///
    /// Returns the cached result if one is pinned; otherwise reads ownership
    /// signals and derives the tier with highest-wins precedence. A ledger
    /// read error degrades to Free with a non-fatal warning - the caller is
    /// never blocked on a broken ledger, and the next change event retries.
    pub async fn resolve(&self) -> TierEntitlement {
        {
            let cached = self.cached.lock().await;
            if let Some(entitlement) = cached.as_ref() {
                return entitlement.clone();
            }
        }

        let entitlement = match self.ledger.get_entitlement(&self.account).await {
            Ok(signals) => TierEntitlement {
                tier: signals.tier(),
                source_token_ids: signals.token_ids,
            },
            Err(e) => {
                tracing::warn!(
                    account = %self.account,
                    error = %e,
                    "Entitlement read failed, degrading to Free"
                );
                TierEntitlement::default()
            }
        };

        {
            let mut cached = self.cached.lock().await;
            *cached = Some(entitlement.clone());
        }
        // send_replace never fails even with no receivers
        self.tier_tx.send_replace(entitlement.tier);

        entitlement
    }

    /// Drop the cached entitlement so the next resolve re-reads the ledger
    pub async fn invalidate(&self) {
        let mut cached = self.cached.lock().await;
        *cached = None;
    }

    /// Invalidate and re-resolve after a ledger change event
    pub async fn refresh(&self) -> TierEntitlement {
        self.invalidate().await;
        self.resolve().await
    }
}
