#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::multiple_crate_versions)]
//! Shared HTTP DTOs for the Stockroom inventory API.
//!
//! These types describe every payload exchanged with the inventory server. Remote
//! data is decoded into them and checked with [`Validate`] before anything else
//! in the workspace gets to see it, so downstream code can rely on positive ids,
//! non-empty names and unique tag references.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Numeric identifier used for every server-side record.
pub type RecordId = u64;

/// Failures raised while validating payloads at the API boundary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModelError {
    /// An identifier was zero.
    #[error("{field} must be a positive identifier")]
    InvalidId {
        /// Field carrying the identifier.
        field: &'static str,
    },
    /// A name was empty after trimming.
    #[error("{field} must not be empty")]
    EmptyField {
        /// Field that was empty.
        field: &'static str,
    },
    /// The same tag appeared twice on one item.
    #[error("tag {id} is referenced more than once")]
    DuplicateTag {
        /// Duplicated tag id.
        id: RecordId,
    },
}

/// Boundary validation for decoded payloads.
pub trait Validate {
    /// Check the invariants downstream code relies on.
    ///
    /// # Errors
    ///
    /// Returns the first [`ModelError`] encountered.
    fn validate(&self) -> Result<(), ModelError>;
}

impl<T: Validate> Validate for Vec<T> {
    fn validate(&self) -> Result<(), ModelError> {
        self.iter().try_for_each(Validate::validate)
    }
}

const fn require_id(id: RecordId, field: &'static str) -> Result<(), ModelError> {
    if id == 0 {
        Err(ModelError::InvalidId { field })
    } else {
        Ok(())
    }
}

fn require_text(value: &str, field: &'static str) -> Result<(), ModelError> {
    if value.trim().is_empty() {
        Err(ModelError::EmptyField { field })
    } else {
        Ok(())
    }
}

/// Identity of the signed-in user as returned by `users/me/`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Identity {
    /// Server-side user id.
    pub id: RecordId,
}

impl Validate for Identity {
    fn validate(&self) -> Result<(), ModelError> {
        require_id(self.id, "identity.id")
    }
}

/// Foreign-key reference embedded in an item.
///
/// List payloads carry bare ids while detail payloads expand them to
/// `{id, name}`; both shapes decode into this type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(from = "ReferenceRepr")]
pub struct Reference {
    /// Referenced record id.
    pub id: RecordId,
    /// Display name when the server expanded the reference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Reference {
    /// Reference known only by id.
    #[must_use]
    pub const fn id(id: RecordId) -> Self {
        Self { id, name: None }
    }

    /// Display label, falling back to `#id` when the name was not expanded.
    #[must_use]
    pub fn label(&self) -> String {
        self.name
            .as_deref()
            .map_or_else(|| format!("#{}", self.id), str::to_string)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ReferenceRepr {
    Bare(RecordId),
    Expanded {
        id: RecordId,
        #[serde(default)]
        name: Option<String>,
    },
}

impl From<ReferenceRepr> for Reference {
    fn from(value: ReferenceRepr) -> Self {
        match value {
            ReferenceRepr::Bare(id) => Self { id, name: None },
            ReferenceRepr::Expanded { id, name } => Self { id, name },
        }
    }
}

/// Image attached to an item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemImage {
    /// Image record id.
    pub id: RecordId,
    /// Public URL of the stored image.
    #[serde(rename = "image")]
    pub url: String,
    /// Upload timestamp.
    pub uploaded_at: DateTime<Utc>,
}

impl Validate for ItemImage {
    fn validate(&self) -> Result<(), ModelError> {
        require_id(self.id, "image.id")?;
        require_text(&self.url, "image.image")
    }
}

/// Inventory item as returned by `items/` and `items/{id}/`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Item {
    /// Item id.
    pub id: RecordId,
    /// Display name.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Storage location.
    #[serde(default)]
    pub location: Option<Reference>,
    /// Item group.
    #[serde(default)]
    pub group: Option<Reference>,
    /// Tags applied to the item.
    #[serde(default)]
    pub tags: Vec<Reference>,
    /// Images in upload order.
    #[serde(default)]
    pub images: Vec<ItemImage>,
    /// Owning user; immutable after creation.
    pub owner: Reference,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Item {
    /// First image, used as the thumbnail.
    #[must_use]
    pub fn cover_image(&self) -> Option<&ItemImage> {
        self.images.first()
    }
}

impl Validate for Item {
    fn validate(&self) -> Result<(), ModelError> {
        require_id(self.id, "item.id")?;
        require_text(&self.name, "item.name")?;
        require_id(self.owner.id, "item.owner")?;
        if let Some(location) = &self.location {
            require_id(location.id, "item.location")?;
        }
        if let Some(group) = &self.group {
            require_id(group.id, "item.group")?;
        }
        let mut seen = HashSet::with_capacity(self.tags.len());
        for tag in &self.tags {
            require_id(tag.id, "item.tags")?;
            if !seen.insert(tag.id) {
                return Err(ModelError::DuplicateTag { id: tag.id });
            }
        }
        self.images.validate()
    }
}

/// Minimal acknowledgement returned by `POST items/`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemCreated {
    /// Id assigned by the server.
    pub id: RecordId,
}

impl Validate for ItemCreated {
    fn validate(&self) -> Result<(), ModelError> {
        require_id(self.id, "item.id")
    }
}

/// Mutable item fields sent on create and update.
///
/// Owner and creation time are deliberately absent: the server assigns them
/// and they never change afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemDraft {
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Storage location id.
    pub location: Option<RecordId>,
    /// Item group id.
    pub group: Option<RecordId>,
    /// Tag ids.
    pub tags: Vec<RecordId>,
}

impl ItemDraft {
    /// Normalise the draft: trim text and drop repeated tag ids, keeping order.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError`] when the name is empty or any id is zero.
    pub fn normalized(self) -> Result<Self, ModelError> {
        let name = self.name.trim().to_string();
        require_text(&name, "name")?;
        for (id, field) in [(self.location, "location"), (self.group, "group")] {
            if let Some(id) = id {
                require_id(id, field)?;
            }
        }
        let mut seen = HashSet::with_capacity(self.tags.len());
        let mut tags = Vec::with_capacity(self.tags.len());
        for tag in self.tags {
            require_id(tag, "tags")?;
            if seen.insert(tag) {
                tags.push(tag);
            }
        }
        Ok(Self {
            name,
            description: self.description.trim().to_string(),
            location: self.location,
            group: self.group,
            tags,
        })
    }

    /// Build a draft that reproduces the mutable fields of an existing item.
    #[must_use]
    pub fn from_item(item: &Item) -> Self {
        Self {
            name: item.name.clone(),
            description: item.description.clone(),
            location: item.location.as_ref().map(|r| r.id),
            group: item.group.as_ref().map(|r| r.id),
            tags: item.tags.iter().map(|r| r.id).collect(),
        }
    }
}

/// Reference list endpoints available for filters and forms.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    /// `locations/`
    Locations,
    /// `tags/`
    Tags,
    /// `groups/`
    Groups,
}

impl ReferenceKind {
    /// Relative endpoint path under the API root.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Locations => "locations/",
            Self::Tags => "tags/",
            Self::Groups => "groups/",
        }
    }

    /// Stable lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Locations => "locations",
            Self::Tags => "tags",
            Self::Groups => "groups",
        }
    }
}

/// Entry of a reference list (location, tag or group).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReferenceEntry {
    /// Record id.
    pub id: RecordId,
    /// Display name.
    pub name: String,
    /// Optional description (locations and groups only).
    #[serde(default)]
    pub description: String,
}

/// Storage location.
pub type Location = ReferenceEntry;
/// Item tag.
pub type Tag = ReferenceEntry;
/// Item group.
pub type Group = ReferenceEntry;

impl Validate for ReferenceEntry {
    fn validate(&self) -> Result<(), ModelError> {
        require_id(self.id, "reference.id")?;
        require_text(&self.name, "reference.name")
    }
}

/// Credential exchange request for `POST token/`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TokenRequest {
    /// Account name.
    pub username: String,
    /// Account password.
    pub password: String,
}

/// Credential exchange response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenResponse {
    /// Bearer token attached to subsequent requests.
    pub access: String,
    /// Refresh token when the server issues one; not used by the client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh: Option<String>,
}

impl Validate for TokenResponse {
    fn validate(&self) -> Result<(), ModelError> {
        require_text(&self.access, "access")
    }
}

/// Error document returned by the server.
///
/// Either a `detail` message or a map of field names to message lists.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProblemDocument {
    /// General error message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Field-level messages keyed by field name.
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl ProblemDocument {
    /// Best human-readable message carried by the document.
    #[must_use]
    pub fn message(&self) -> Option<String> {
        if let Some(detail) = self.detail.as_deref().filter(|d| !d.trim().is_empty()) {
            return Some(detail.trim().to_string());
        }
        let parts: Vec<String> = self
            .fields
            .iter()
            .filter_map(|(field, value)| {
                let text = match value {
                    Value::String(text) => text.clone(),
                    Value::Array(values) => values
                        .iter()
                        .filter_map(Value::as_str)
                        .collect::<Vec<_>>()
                        .join(" "),
                    _ => return None,
                };
                (!text.is_empty()).then(|| format!("{field}: {text}"))
            })
            .collect();
        (!parts.is_empty()).then(|| parts.join("; "))
    }
}
