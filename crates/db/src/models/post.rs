//! Per-post tag view models.

use sqlx::FromRow;
use tagd_core::tag::{Privacy, TagGroups};
use tagd_core::types::DbId;

/// One row of the per-post tag query: the post's metadata repeated across
/// one row per tag class. A known post with no tags yields a single row
/// with a NULL class.
#[derive(Debug, FromRow)]
pub struct PostTagRow {
    pub uploader: DbId,
    pub privacy: String,
    pub class: Option<String>,
    pub tags: Vec<String>,
}

/// Assembled per-post view: uploader, visibility, and non-deprecated tags
/// grouped by class.
#[derive(Debug, Clone)]
pub struct PostTags {
    pub uploader: DbId,
    pub privacy: Privacy,
    pub groups: TagGroups,
}

impl PostTags {
    /// Assemble the query rows. An empty row set means the post does not
    /// exist, which is distinct from a post with zero tags.
    pub fn from_rows(rows: Vec<PostTagRow>) -> Result<Option<Self>, sqlx::Error> {
        let Some(first) = rows.first() else {
            return Ok(None);
        };

        let uploader = first.uploader;
        let privacy: Privacy = first
            .privacy
            .parse()
            .map_err(|e: tagd_core::error::CoreError| sqlx::Error::Decode(Box::new(e)))?;

        let groups = TagGroups::from_pairs(rows.into_iter().flat_map(|row| {
            let class = row.class;
            row.tags
                .into_iter()
                .filter_map(move |tag| class.clone().map(|c| (c, tag)))
        }));

        Ok(Some(PostTags {
            uploader,
            privacy,
            groups,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_post_is_distinct_from_untagged_post() {
        assert!(PostTags::from_rows(Vec::new()).unwrap().is_none());

        let untagged = PostTags::from_rows(vec![PostTagRow {
            uploader: 3,
            privacy: "public".into(),
            class: None,
            tags: Vec::new(),
        }])
        .unwrap()
        .expect("known post");
        assert!(untagged.groups.is_empty());
        assert_eq!(untagged.uploader, 3);
        assert_eq!(untagged.privacy, Privacy::Public);
    }

    #[test]
    fn rows_assemble_into_sorted_groups() {
        let view = PostTags::from_rows(vec![
            PostTagRow {
                uploader: 1,
                privacy: "unlisted".into(),
                class: Some("misc".into()),
                tags: vec!["fox".into(), "forest".into()],
            },
            PostTagRow {
                uploader: 1,
                privacy: "unlisted".into(),
                class: Some("artist".into()),
                tags: vec!["wren".into()],
            },
        ])
        .unwrap()
        .expect("known post");

        assert_eq!(view.groups.0["misc"], vec!["forest", "fox"]);
        assert_eq!(view.groups.0["artist"], vec!["wren"]);
    }
}
