//! Step catalog: the ordered editable sections for a tier
//!
//! The catalog is pure and deterministic, and strictly prefix-inclusive:
//! every tier's step list extends the list of the tier below it, so a step
//! index means the same section at every tier that has it. The sidebar
//! renders from this list and the access gate bounds step indexes with it.

use crate::document::SectionId;
use crate::tier::Tier;
use serde::Serialize;

/// One entry in the step catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepDescriptor {
    /// Section this step edits
    pub id: SectionId,
    /// Sidebar label
    pub label: &'static str,
    /// Lowest tier that unlocks the step
    pub required_tier: Tier,
    /// Position in the full catalog
    pub order: usize,
}

/// Steps a Free document can ever reach, regardless of catalog growth
pub const FREE_STEP_LIMIT: usize = 3;

/// The full catalog, ordered by tier then position. Keeping lower tiers
/// first is what makes every tier's view a prefix of the next.
const FULL_CATALOG: &[(SectionId, &str)] = &[
    (SectionId::ProfileBasics, "Profile"),
    (SectionId::Recipes, "Recipes"),
    (SectionId::Notes, "Sticky notes"),
    (SectionId::Haccp, "HACCP control points"),
    (SectionId::Gallery, "Gallery"),
    (SectionId::OrganizationInfo, "Organization"),
    (SectionId::Team, "Team"),
    (SectionId::OgShowcase, "OG showcase"),
];

/// Pure, deterministic step catalog
pub struct StepCatalog;

impl StepCatalog {
    /// Every step in catalog order, regardless of tier
    pub fn all_steps() -> Vec<StepDescriptor> {
        FULL_CATALOG
            .iter()
            .copied()
            .enumerate()
            .map(|(order, (id, label))| StepDescriptor {
                id,
                label,
                required_tier: id.required_tier(),
                order,
            })
            .collect()
    }

    /// The ordered steps a tier unlocks.
    ///
    /// `steps_for(Free)` is a strict prefix of `steps_for(Pro)`, which is a
    /// strict prefix of `steps_for(Group)`; OG appends further steps.
    pub fn steps_for(tier: Tier) -> Vec<StepDescriptor> {
        Self::all_steps()
            .into_iter()
            .filter(|step| tier.satisfies(step.required_tier))
            .collect()
    }

    /// Index of a section in the full catalog
    pub fn index_of(section: SectionId) -> usize {
        FULL_CATALOG
            .iter()
            .position(|(id, _)| *id == section)
            .expect("every section is in the catalog")
    }

    /// Descriptor at a full-catalog index
    pub fn step_at(index: usize) -> Option<StepDescriptor> {
        Self::all_steps().into_iter().nth(index)
    }
}
