//! Tag row models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tagd_core::types::DbId;

/// The internal form of a tag: what the repository returns and the cache
/// stores. The owner stays a numeric id here; resolution to a portable
/// user record happens at projection time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InternalTag {
    pub name: String,
    pub group: String,
    pub owner: Option<DbId>,
    pub deprecated: bool,
    pub inherited_tags: Vec<String>,
    pub description: Option<String>,
}

/// Flat row shape produced by the tag queries.
#[derive(Debug, FromRow)]
pub struct TagRow {
    pub name: String,
    pub class: String,
    pub owner: Option<DbId>,
    pub deprecated: bool,
    pub inherited: Vec<String>,
    pub description: Option<String>,
}

impl From<TagRow> for InternalTag {
    fn from(row: TagRow) -> Self {
        InternalTag {
            name: row.name,
            group: row.class,
            owner: row.owner,
            deprecated: row.deprecated,
            inherited_tags: row.inherited,
            description: row.description,
        }
    }
}

/// Row read under `FOR UPDATE` inside the update transaction; carries just
/// what authorization needs.
#[derive(Debug, FromRow)]
pub struct TagOwnership {
    pub owner: Option<DbId>,
}

/// Fieldset applied by the tag update statement. Absent fields are no-ops.
#[derive(Debug, Clone, Default)]
pub struct TagPatch {
    pub name: Option<String>,
    pub group: Option<String>,
    pub owner: Option<DbId>,
    pub description: Option<String>,
    pub deprecated: Option<bool>,
}

impl TagPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.group.is_none()
            && self.owner.is_none()
            && self.description.is_none()
            && self.deprecated.is_none()
    }
}
