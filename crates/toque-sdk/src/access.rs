//! Step-level access control
//!
//! The gate is consulted twice per edit: once to keep navigation from
//! jumping to a locked step, and again before a mutation is applied, so a
//! write to a locked section never reaches the draft or the commit layer.

use crate::error::{Result, StudioError};
use crate::steps::{StepCatalog, FREE_STEP_LIMIT};
use crate::tier::Tier;

/// Decides whether a step index is reachable at a tier.
#[derive(Debug, Clone, Copy)]
pub struct AccessGate;

impl AccessGate {
    /// Check whether `step_index` (into the full catalog) is accessible.
    ///
    /// A step is accessible when its required tier is satisfied. Free is
    /// additionally capped at `FREE_STEP_LIMIT` steps even if the catalog
    /// in front of it grows. Out-of-range indexes are never accessible.
    /// `completed_count` is carried for sequential-navigation callers; it
    /// neither unlocks a tier-locked step nor locks an unlocked one.
    pub fn can_access(step_index: usize, tier: Tier, _completed_count: usize) -> bool {
        let step = match StepCatalog::step_at(step_index) {
            Some(step) => step,
            None => return false,
        };

        if !tier.satisfies(step.required_tier) {
            return false;
        }

        if tier == Tier::Free && step_index >= FREE_STEP_LIMIT {
            return false;
        }

        true
    }

    /// Check access and return a structured error if denied
    pub fn check_access(step_index: usize, tier: Tier, completed_count: usize) -> Result<()> {
        if Self::can_access(step_index, tier, completed_count) {
            return Ok(());
        }

        let required = StepCatalog::step_at(step_index)
            .map(|step| step.required_tier.to_string())
            .unwrap_or_else(|| "out of range".to_string());

        Err(StudioError::AccessDenied {
            step_index,
            required,
            actual: tier.to_string(),
        })
    }
}
