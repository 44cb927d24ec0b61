//! Item Entity
//!
//! A prompt in the tree: single parent, ordered among siblings by `position`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity::{DomainError, DomainResult, Entity};

/// Opaque, stable item identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh time-ordered id (UUIDv7 text)
    pub fn generate() -> Self {
        Self(uuid::Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Boolean flags that change independently of tree structure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemFlag {
    Starred,
    ExcludedFromCascade,
    ExcludedFromExport,
}

impl ItemFlag {
    /// Storage column backing this flag
    pub fn column(&self) -> &'static str {
        match self {
            ItemFlag::Starred => "starred",
            ItemFlag::ExcludedFromCascade => "excluded_from_cascade",
            ItemFlag::ExcludedFromExport => "excluded_from_export",
        }
    }
}

/// What happens to the children of a deleted item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteStrategy {
    /// Remove the item and every descendant
    #[default]
    Cascade,
    /// Remove only the item; its children move up to its parent
    PromoteChildren,
}

/// A prompt node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    /// Parent item ID (None = root level)
    pub parent_id: Option<ItemId>,
    /// Sort key among siblings; not contiguous, not integral
    pub position: f64,
    pub label: String,
    pub starred: bool,
    pub excluded_from_cascade: bool,
    pub excluded_from_export: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Item {
    /// Create a new root item with default values
    pub fn new(id: impl Into<ItemId>, label: impl Into<String>, position: f64) -> Self {
        Self {
            id: id.into(),
            parent_id: None,
            position,
            label: label.into(),
            starred: false,
            excluded_from_cascade: false,
            excluded_from_export: false,
            created_at: None,
            updated_at: None,
        }
    }

    /// Create a new child item under a parent
    pub fn new_child(
        id: impl Into<ItemId>,
        label: impl Into<String>,
        parent_id: impl Into<ItemId>,
        position: f64,
    ) -> Self {
        Self {
            parent_id: Some(parent_id.into()),
            ..Self::new(id, label, position)
        }
    }

    /// Check if this is a root item (no parent)
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn flag(&self, flag: ItemFlag) -> bool {
        match flag {
            ItemFlag::Starred => self.starred,
            ItemFlag::ExcludedFromCascade => self.excluded_from_cascade,
            ItemFlag::ExcludedFromExport => self.excluded_from_export,
        }
    }

    pub fn set_flag(&mut self, flag: ItemFlag, value: bool) {
        match flag {
            ItemFlag::Starred => self.starred = value,
            ItemFlag::ExcludedFromCascade => self.excluded_from_cascade = value,
            ItemFlag::ExcludedFromExport => self.excluded_from_export = value,
        }
    }

    /// Sibling order: ascending position, ties broken by id
    pub fn sibling_cmp(&self, other: &Item) -> std::cmp::Ordering {
        self.position
            .total_cmp(&other.position)
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl Entity for Item {
    type Id = ItemId;

    fn id(&self) -> Self::Id {
        self.id.clone()
    }
}

/// Row as delivered by a backend fetch, before normalization
///
/// Older rows carry `row_id` / `parent_row_id` / `prompt_name` instead of the
/// canonical names, and any non-key column may be missing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemRow {
    pub id: Option<String>,
    pub row_id: Option<String>,
    #[serde(alias = "parent_row_id")]
    pub parent_id: Option<String>,
    pub position: Option<f64>,
    #[serde(alias = "prompt_name")]
    pub label: Option<String>,
    #[serde(alias = "is_starred")]
    pub starred: Option<bool>,
    #[serde(alias = "exclude_from_cascade")]
    pub excluded_from_cascade: Option<bool>,
    #[serde(alias = "exclude_from_export")]
    pub excluded_from_export: Option<bool>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl TryFrom<ItemRow> for Item {
    type Error = DomainError;

    fn try_from(row: ItemRow) -> DomainResult<Self> {
        let id = row
            .id
            .or(row.row_id)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| DomainError::InvalidInput("row without id".to_string()))?;

        let position = match row.position {
            Some(p) if p.is_finite() => p,
            Some(p) => {
                return Err(DomainError::InvalidInput(format!(
                    "row {} has non-finite position {}",
                    id, p
                )))
            }
            None => {
                log::warn!("row {} has no position, defaulting to 0", id);
                0.0
            }
        };

        Ok(Item {
            id: ItemId(id),
            parent_id: row.parent_id.filter(|p| !p.is_empty()).map(ItemId),
            position,
            label: row.label.unwrap_or_default(),
            starred: row.starred.unwrap_or(false),
            excluded_from_cascade: row.excluded_from_cascade.unwrap_or(false),
            excluded_from_export: row.excluded_from_export.unwrap_or(false),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
