//! The tag data model: name normalization, per-post groupings, and the
//! public (portable) forms served to clients.

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Maximum length of a tag description.
pub const MAX_DESCRIPTION_LEN: usize = 1000;

/// Normalize a single tag name: trimmed, lowercased, non-empty.
pub fn normalize_tag(raw: &str) -> Result<String, CoreError> {
    let tag = raw.trim().to_lowercase();
    if tag.is_empty() {
        return Err(CoreError::BadRequest("tag names must not be empty".into()));
    }
    Ok(tag)
}

/// Normalize and deduplicate a client-supplied tag list.
///
/// Order is not preserved; the result is the set the mutation operates on.
pub fn normalize_tags<I, S>(raw: I) -> Result<BTreeSet<String>, CoreError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    raw.into_iter().map(|t| normalize_tag(t.as_ref())).collect()
}

/// Validate an optional description against [`MAX_DESCRIPTION_LEN`].
pub fn validate_description(description: &str) -> Result<(), CoreError> {
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(CoreError::BadRequest(format!(
            "description must be at most {MAX_DESCRIPTION_LEN} characters"
        )));
    }
    Ok(())
}

/// Post visibility. Only `public` posts contribute to tag counters;
/// `private` posts are visible to their uploader alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Privacy {
    Public,
    Unlisted,
    Private,
}

impl Privacy {
    pub fn is_public(self) -> bool {
        matches!(self, Privacy::Public)
    }

    /// Whether any caller, authenticated or not, may see the post's tags.
    pub fn visible_to_all(self) -> bool {
        matches!(self, Privacy::Public | Privacy::Unlisted)
    }
}

impl FromStr for Privacy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Privacy::Public),
            "unlisted" => Ok(Privacy::Unlisted),
            "private" => Ok(Privacy::Private),
            other => Err(CoreError::Internal(format!("unknown privacy level '{other}'"))),
        }
    }
}

/// Tags of one post, keyed by tag class.
///
/// Member lists are kept alphabetical, except for frequently-used results
/// which are ordered by descending use count at construction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagGroups(pub BTreeMap<String, Vec<String>>);

impl TagGroups {
    /// Assemble groupings from `(class, tag)` pairs, sorting each member
    /// list alphabetically.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (class, tag) in pairs {
            map.entry(class).or_default().push(tag);
        }
        for tags in map.values_mut() {
            tags.sort();
            tags.dedup();
        }
        Self(map)
    }

    /// Flattened set of every tag name across all groups.
    pub fn tag_set(&self) -> BTreeSet<String> {
        self.0.values().flatten().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(Vec::is_empty)
    }
}

/// A user as served to clients: handle plus display name, no internal ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPortable {
    pub handle: String,
    pub name: Option<String>,
}

/// A tag as served to clients.
///
/// The internal form's owner id is resolved to a [`UserPortable`] and the
/// public-use count is attached from the counter store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub tag: String,
    pub owner: Option<UserPortable>,
    pub group: String,
    pub deprecated: bool,
    pub inherited_tags: Vec<String>,
    pub description: Option<String>,
    pub count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_lowercases_and_trims() {
        assert_eq!(normalize_tag("  Fox ").unwrap(), "fox");
        assert_eq!(normalize_tag("FOREST").unwrap(), "forest");
    }

    #[test]
    fn empty_tag_rejected() {
        assert!(normalize_tag("   ").is_err());
        assert!(normalize_tags(["fox", ""]).is_err());
    }

    #[test]
    fn normalized_set_deduplicates() {
        let tags = normalize_tags(["Fox", "fox", " FOX "]).unwrap();
        assert_eq!(tags.into_iter().collect::<Vec<_>>(), vec!["fox"]);
    }

    #[test]
    fn groups_sort_members_alphabetically() {
        let groups = TagGroups::from_pairs([
            ("misc".to_string(), "fox".to_string()),
            ("misc".to_string(), "forest".to_string()),
        ]);
        assert_eq!(groups.0["misc"], vec!["forest", "fox"]);
    }

    #[test]
    fn description_bound_is_inclusive() {
        assert!(validate_description(&"a".repeat(1000)).is_ok());
        assert!(validate_description(&"a".repeat(1001)).is_err());
    }
}
