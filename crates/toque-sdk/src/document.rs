//! Document model: the tier-tagged profile and its editable sections
//!
//! A document is a tagged union over the four tiers. Every variant shares the
//! required `ProfileCore` prefix; higher tiers add cumulative extension
//! blocks, so a Free document cannot even construct a Group field. Sections
//! are the independently editable sub-objects, one per studio step, and all
//! edits arrive as `Mutation`s addressed to a section.

use crate::error::{Result, StudioError};
use crate::tier::Tier;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Identity of a durably registered document (the registry slot key).
///
/// Absent until the first successful commit assigns one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DurableId(pub String);

impl std::fmt::Display for DurableId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to content-addressed bytes in the blob store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentRef(pub String);

impl std::fmt::Display for ContentRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

mod base64_bytes {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        base64::engine::general_purpose::STANDARD
            .decode(s)
            .map_err(serde::de::Error::custom)
    }
}

/// A binary field that is large enough to live in the content store.
///
/// Starts `Inline` when the user attaches bytes; the commit gateway uploads
/// inline blobs and the durable form always carries `Stored` references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum BlobField {
    /// Raw bytes not yet uploaded
    Inline {
        media_type: String,
        #[serde(with = "base64_bytes")]
        bytes: Vec<u8>,
    },
    /// Content-addressed reference after upload
    Stored {
        media_type: String,
        content_ref: ContentRef,
        size_bytes: u64,
    },
}

impl BlobField {
    /// Attach raw bytes for later upload
    pub fn inline(media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self::Inline {
            media_type: media_type.into(),
            bytes,
        }
    }
}

// ============================================================================
// Section content types
// ============================================================================

/// One ingredient line in a recipe
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub name: String,
    pub quantity: String,
}

/// A recipe on the profile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub title: String,
    #[serde(default)]
    pub ingredients: Vec<Ingredient>,
    #[serde(default)]
    pub instructions: Vec<String>,
    #[serde(default)]
    pub servings: Option<u32>,
}

/// A sticky note pinned to the profile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StickyNote {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub color: Option<String>,
}

/// A HACCP control point (Pro tier and up)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlPoint {
    pub hazard: String,
    pub critical_limit: String,
    #[serde(default)]
    pub monitoring: String,
    #[serde(default)]
    pub corrective_action: String,
}

/// Organization details (Group tier and up)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrganizationInfo {
    pub name: String,
    #[serde(default)]
    pub registration_no: Option<String>,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub certifications: Vec<String>,
}

/// A team member listing (Group tier and up)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamMember {
    pub name: String,
    #[serde(default)]
    pub role: String,
}

/// A founding-era showcase entry (OG tier)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShowcaseEntry {
    pub title: String,
    #[serde(default)]
    pub year: Option<u16>,
    #[serde(default)]
    pub story: String,
}

/// The required prefix every tier shares
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileCore {
    /// Registry slot, assigned on first successful commit
    #[serde(default)]
    pub durable_id: Option<DurableId>,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub avatar: Option<BlobField>,
    #[serde(default)]
    pub recipes: Vec<Recipe>,
    #[serde(default)]
    pub notes: Vec<StickyNote>,
}

/// Sections added at Pro
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProExtension {
    #[serde(default)]
    pub haccp_points: Vec<ControlPoint>,
    #[serde(default)]
    pub gallery: Vec<BlobField>,
}

/// Sections added at Group
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupExtension {
    #[serde(default)]
    pub organization: OrganizationInfo,
    #[serde(default)]
    pub team: Vec<TeamMember>,
}

/// Sections added at OG
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OgExtension {
    #[serde(default)]
    pub showcase: Vec<ShowcaseEntry>,
}

// ============================================================================
// Document
// ============================================================================

/// A tier-tagged profile document.
///
/// The tag doubles as the tier: the serialized form carries
/// `"tier": "free" | "pro" | "group" | "og"`, matching `Tier::as_str`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tier", rename_all = "lowercase")]
pub enum Document {
    Free {
        core: ProfileCore,
    },
    Pro {
        core: ProfileCore,
        pro: ProExtension,
    },
    Group {
        core: ProfileCore,
        pro: ProExtension,
        group: GroupExtension,
    },
    Og {
        core: ProfileCore,
        pro: ProExtension,
        group: GroupExtension,
        og: OgExtension,
    },
}

impl Document {
    /// Create an empty document at the given tier
    pub fn new(tier: Tier) -> Self {
        match tier {
            Tier::Free => Self::Free {
                core: ProfileCore::default(),
            },
            Tier::Pro => Self::Pro {
                core: ProfileCore::default(),
                pro: ProExtension::default(),
            },
            Tier::Group => Self::Group {
                core: ProfileCore::default(),
                pro: ProExtension::default(),
                group: GroupExtension::default(),
            },
            Tier::Og => Self::Og {
                core: ProfileCore::default(),
                pro: ProExtension::default(),
                group: GroupExtension::default(),
                og: OgExtension::default(),
            },
        }
    }

    /// The tier this document is shaped for
    pub fn tier(&self) -> Tier {
        match self {
            Self::Free { .. } => Tier::Free,
            Self::Pro { .. } => Tier::Pro,
            Self::Group { .. } => Tier::Group,
            Self::Og { .. } => Tier::Og,
        }
    }

    /// Shared prefix, read-only
    pub fn core(&self) -> &ProfileCore {
        match self {
            Self::Free { core }
            | Self::Pro { core, .. }
            | Self::Group { core, .. }
            | Self::Og { core, .. } => core,
        }
    }

    /// Shared prefix, mutable
    pub fn core_mut(&mut self) -> &mut ProfileCore {
        match self {
            Self::Free { core }
            | Self::Pro { core, .. }
            | Self::Group { core, .. }
            | Self::Og { core, .. } => core,
        }
    }

    /// Pro extension when the tier carries one
    pub fn pro(&self) -> Option<&ProExtension> {
        match self {
            Self::Free { .. } => None,
            Self::Pro { pro, .. } | Self::Group { pro, .. } | Self::Og { pro, .. } => Some(pro),
        }
    }

    fn pro_mut(&mut self) -> Option<&mut ProExtension> {
        match self {
            Self::Free { .. } => None,
            Self::Pro { pro, .. } | Self::Group { pro, .. } | Self::Og { pro, .. } => Some(pro),
        }
    }

    /// Group extension when the tier carries one
    pub fn group(&self) -> Option<&GroupExtension> {
        match self {
            Self::Group { group, .. } | Self::Og { group, .. } => Some(group),
            _ => None,
        }
    }

    fn group_mut(&mut self) -> Option<&mut GroupExtension> {
        match self {
            Self::Group { group, .. } | Self::Og { group, .. } => Some(group),
            _ => None,
        }
    }

    /// OG extension when the tier carries one
    pub fn og(&self) -> Option<&OgExtension> {
        match self {
            Self::Og { og, .. } => Some(og),
            _ => None,
        }
    }

    fn og_mut(&mut self) -> Option<&mut OgExtension> {
        match self {
            Self::Og { og, .. } => Some(og),
            _ => None,
        }
    }

    /// Registry identity, absent until first successful commit
    pub fn durable_id(&self) -> Option<&DurableId> {
        self.core().durable_id.as_ref()
    }

    /// Record the registry identity after a confirmed commit
    pub fn set_durable_id(&mut self, id: DurableId) {
        self.core_mut().durable_id = Some(id);
    }

    fn into_parts(
        self,
    ) -> (
        ProfileCore,
        Option<ProExtension>,
        Option<GroupExtension>,
        Option<OgExtension>,
    ) {
        match self {
            Self::Free { core } => (core, None, None, None),
            Self::Pro { core, pro } => (core, Some(pro), None, None),
            Self::Group { core, pro, group } => (core, Some(pro), Some(group), None),
            Self::Og {
                core,
                pro,
                group,
                og,
            } => (core, Some(pro), Some(group), Some(og)),
        }
    }

    /// Reshape the document for a new tier, keeping everything already
    /// entered that the new tier can hold.
    ///
    /// An upgrade fills the new extension blocks with empty defaults; a
    /// downgrade drops the extensions the lower tier cannot carry. Callers
    /// surface downgrades to the user before applying one.
    pub fn at_tier(self, tier: Tier) -> Self {
        let (core, pro, group, og) = self.into_parts();
        match tier {
            Tier::Free => Self::Free { core },
            Tier::Pro => Self::Pro {
                core,
                pro: pro.unwrap_or_default(),
            },
            Tier::Group => Self::Group {
                core,
                pro: pro.unwrap_or_default(),
                group: group.unwrap_or_default(),
            },
            Tier::Og => Self::Og {
                core,
                pro: pro.unwrap_or_default(),
                group: group.unwrap_or_default(),
                og: og.unwrap_or_default(),
            },
        }
    }
}

// ============================================================================
// Sections and mutations
// ============================================================================

/// One editable section per studio step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SectionId {
    ProfileBasics,
    Recipes,
    Notes,
    Haccp,
    Gallery,
    OrganizationInfo,
    Team,
    OgShowcase,
}

impl SectionId {
    /// String form used in wire payloads and preview routes
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProfileBasics => "profile-basics",
            Self::Recipes => "recipes",
            Self::Notes => "notes",
            Self::Haccp => "haccp",
            Self::Gallery => "gallery",
            Self::OrganizationInfo => "organization-info",
            Self::Team => "team",
            Self::OgShowcase => "og-showcase",
        }
    }

    /// Lowest tier whose documents carry this section
    pub fn required_tier(&self) -> Tier {
        match self {
            Self::ProfileBasics | Self::Recipes | Self::Notes => Tier::Free,
            Self::Haccp | Self::Gallery => Tier::Pro,
            Self::OrganizationInfo | Self::Team => Tier::Group,
            Self::OgShowcase => Tier::Og,
        }
    }
}

impl std::fmt::Display for SectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a mutation does to its section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationOp {
    Add,
    Update,
    Remove,
    Reorder,
}

/// Whether applying a mutation also drives a durable commit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommitPolicy {
    /// Local-only until an explicit `commit_current`
    #[default]
    Deferred,
    /// Commit inside the apply pipeline
    Immediate,
}

/// One user edit addressed to a section
#[derive(Debug, Clone)]
pub struct Mutation {
    pub section: SectionId,
    pub op: MutationOp,
    pub payload: serde_json::Value,
    pub commit: CommitPolicy,
}

impl Mutation {
    pub fn new(section: SectionId, op: MutationOp, payload: serde_json::Value) -> Self {
        Self {
            section,
            op,
            payload,
            commit: CommitPolicy::Deferred,
        }
    }

    pub fn add(section: SectionId, payload: serde_json::Value) -> Self {
        Self::new(section, MutationOp::Add, payload)
    }

    pub fn update(section: SectionId, payload: serde_json::Value) -> Self {
        Self::new(section, MutationOp::Update, payload)
    }

    pub fn remove(section: SectionId, payload: serde_json::Value) -> Self {
        Self::new(section, MutationOp::Remove, payload)
    }

    pub fn reorder(section: SectionId, payload: serde_json::Value) -> Self {
        Self::new(section, MutationOp::Reorder, payload)
    }

    /// Commit durably as part of the apply pipeline
    pub fn committing(mut self) -> Self {
        self.commit = CommitPolicy::Immediate;
        self
    }
}

/// Update payload for list sections: replace the item at `index`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateAt<T> {
    pub index: usize,
    pub item: T,
}

/// Remove payload for list sections
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveAt {
    pub index: usize,
}

/// Reorder payload for list sections: move `from` to `to`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveItem {
    pub from: usize,
    pub to: usize,
}

/// Update payload for the profile-basics section; absent fields are untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BasicsPatch {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub avatar: Option<BlobField>,
}

// ============================================================================
// Mutation application
// ============================================================================

/// Per-item validation for list sections, checked before any state change
trait SectionItem: DeserializeOwned {
    fn validate(&self) -> std::result::Result<(), String>;
}

impl SectionItem for Recipe {
    fn validate(&self) -> std::result::Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("recipe title required".into());
        }
        if self.ingredients.iter().any(|i| i.name.trim().is_empty()) {
            return Err("ingredient name required".into());
        }
        Ok(())
    }
}

impl SectionItem for StickyNote {
    fn validate(&self) -> std::result::Result<(), String> {
        if self.text.trim().is_empty() {
            return Err("note text required".into());
        }
        Ok(())
    }
}

impl SectionItem for ControlPoint {
    fn validate(&self) -> std::result::Result<(), String> {
        if self.hazard.trim().is_empty() {
            return Err("hazard required".into());
        }
        if self.critical_limit.trim().is_empty() {
            return Err("critical limit required".into());
        }
        Ok(())
    }
}

impl SectionItem for BlobField {
    fn validate(&self) -> std::result::Result<(), String> {
        match self {
            Self::Inline { media_type, bytes } => {
                if media_type.is_empty() {
                    return Err("media type required".into());
                }
                if bytes.is_empty() {
                    return Err("empty blob".into());
                }
                Ok(())
            }
            Self::Stored { content_ref, .. } => {
                if content_ref.0.is_empty() {
                    return Err("empty content reference".into());
                }
                Ok(())
            }
        }
    }
}

impl SectionItem for TeamMember {
    fn validate(&self) -> std::result::Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("member name required".into());
        }
        Ok(())
    }
}

impl SectionItem for ShowcaseEntry {
    fn validate(&self) -> std::result::Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("showcase title required".into());
        }
        Ok(())
    }
}

fn invalid(section: SectionId, reason: impl Into<String>) -> StudioError {
    StudioError::Validation {
        section,
        reason: reason.into(),
    }
}

fn parse<T: DeserializeOwned>(section: SectionId, payload: &serde_json::Value) -> Result<T> {
    serde_json::from_value(payload.clone()).map_err(|e| invalid(section, e.to_string()))
}

/// Apply a list operation. Validation and bounds checks happen before any
/// mutation, so a rejected operation leaves the list untouched.
fn apply_list<T: SectionItem>(
    section: SectionId,
    list: &mut Vec<T>,
    op: MutationOp,
    payload: &serde_json::Value,
) -> Result<()> {
    match op {
        MutationOp::Add => {
            let item: T = parse(section, payload)?;
            item.validate().map_err(|r| invalid(section, r))?;
            list.push(item);
        }
        MutationOp::Update => {
            let update: UpdateAt<T> = parse(section, payload)?;
            if update.index >= list.len() {
                return Err(invalid(section, format!("index {} out of range", update.index)));
            }
            update.item.validate().map_err(|r| invalid(section, r))?;
            list[update.index] = update.item;
        }
        MutationOp::Remove => {
            let remove: RemoveAt = parse(section, payload)?;
            if remove.index >= list.len() {
                return Err(invalid(section, format!("index {} out of range", remove.index)));
            }
            list.remove(remove.index);
        }
        MutationOp::Reorder => {
            let mv: MoveItem = parse(section, payload)?;
            if mv.from >= list.len() || mv.to >= list.len() {
                return Err(invalid(
                    section,
                    format!("move {} -> {} out of range", mv.from, mv.to),
                ));
            }
            let item = list.remove(mv.from);
            list.insert(mv.to, item);
        }
    }
    Ok(())
}

impl Document {
    /// Apply one mutation to its section.
    ///
    /// Rejected mutations (bad payload, out-of-range index, section missing
    /// at this tier) leave the document unchanged. Tier gating happens
    /// before this is called; a section the tier does not carry is still
    /// rejected here as a defensive bound.
    pub fn apply(&mut self, mutation: &Mutation) -> Result<()> {
        let section = mutation.section;
        match section {
            SectionId::ProfileBasics => {
                if mutation.op != MutationOp::Update {
                    return Err(invalid(section, "profile basics only supports update"));
                }
                let patch: BasicsPatch = parse(section, &mutation.payload)?;
                if let Some(ref name) = patch.display_name {
                    if name.trim().is_empty() {
                        return Err(invalid(section, "display name required"));
                    }
                }
                if let Some(ref avatar) = patch.avatar {
                    avatar.validate().map_err(|r| invalid(section, r))?;
                }
                let core = self.core_mut();
                if let Some(name) = patch.display_name {
                    core.display_name = name;
                }
                if let Some(bio) = patch.bio {
                    core.bio = bio;
                }
                if let Some(avatar) = patch.avatar {
                    core.avatar = Some(avatar);
                }
                Ok(())
            }
            SectionId::Recipes => {
                apply_list(section, &mut self.core_mut().recipes, mutation.op, &mutation.payload)
            }
            SectionId::Notes => {
                apply_list(section, &mut self.core_mut().notes, mutation.op, &mutation.payload)
            }
            SectionId::Haccp => {
                let pro = self
                    .pro_mut()
                    .ok_or(StudioError::SectionUnavailable(section))?;
                apply_list(section, &mut pro.haccp_points, mutation.op, &mutation.payload)
            }
            SectionId::Gallery => {
                let pro = self
                    .pro_mut()
                    .ok_or(StudioError::SectionUnavailable(section))?;
                apply_list(section, &mut pro.gallery, mutation.op, &mutation.payload)
            }
            SectionId::OrganizationInfo => {
                if mutation.op != MutationOp::Update {
                    return Err(invalid(section, "organization info only supports update"));
                }
                let org: OrganizationInfo = parse(section, &mutation.payload)?;
                if org.name.trim().is_empty() {
                    return Err(invalid(section, "organization name required"));
                }
                let group = self
                    .group_mut()
                    .ok_or(StudioError::SectionUnavailable(section))?;
                group.organization = org;
                Ok(())
            }
            SectionId::Team => {
                let group = self
                    .group_mut()
                    .ok_or(StudioError::SectionUnavailable(section))?;
                apply_list(section, &mut group.team, mutation.op, &mutation.payload)
            }
            SectionId::OgShowcase => {
                let og = self
                    .og_mut()
                    .ok_or(StudioError::SectionUnavailable(section))?;
                apply_list(section, &mut og.showcase, mutation.op, &mutation.payload)
            }
        }
    }

    /// Serialize one section's current content, for preview sync
    pub fn section_value(&self, section: SectionId) -> Result<serde_json::Value> {
        let value = match section {
            SectionId::ProfileBasics => serde_json::json!({
                "display_name": self.core().display_name,
                "bio": self.core().bio,
                "avatar": self.core().avatar,
            }),
            SectionId::Recipes => serde_json::to_value(&self.core().recipes)?,
            SectionId::Notes => serde_json::to_value(&self.core().notes)?,
            SectionId::Haccp => serde_json::to_value(
                &self
                    .pro()
                    .ok_or(StudioError::SectionUnavailable(section))?
                    .haccp_points,
            )?,
            SectionId::Gallery => serde_json::to_value(
                &self
                    .pro()
                    .ok_or(StudioError::SectionUnavailable(section))?
                    .gallery,
            )?,
            SectionId::OrganizationInfo => serde_json::to_value(
                &self
                    .group()
                    .ok_or(StudioError::SectionUnavailable(section))?
                    .organization,
            )?,
            SectionId::Team => serde_json::to_value(
                &self
                    .group()
                    .ok_or(StudioError::SectionUnavailable(section))?
                    .team,
            )?,
            SectionId::OgShowcase => serde_json::to_value(
                &self
                    .og()
                    .ok_or(StudioError::SectionUnavailable(section))?
                    .showcase,
            )?,
        };
        Ok(value)
    }
}
