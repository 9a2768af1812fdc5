//! SQL facade over the tag tables and stored procedures.
//!
//! Multi-row mutations go through the `add_tags` / `remove_tags` /
//! `inherit_tag` procedures so they stay atomic; everything else is a
//! single parameterized statement. Error classification (unique violation
//! to Conflict and so on) happens in the api layer.

use sqlx::{PgConnection, PgPool};
use tagd_core::types::DbId;

use crate::models::post::{PostTagRow, PostTags};
use crate::models::tag::{InternalTag, TagOwnership, TagPatch, TagRow};

/// Column/aggregate list shared by the tag read queries.
const TAG_COLUMNS: &str = "tags.name, tag_classes.class, tags.owner, tags.deprecated, \
     tags.description, \
     array_remove(array_agg(children.name ORDER BY children.name), NULL) AS inherited";

const TAG_JOINS: &str = "INNER JOIN tag_classes ON tag_classes.class_id = tags.class_id \
     LEFT JOIN tag_inheritance ON tag_inheritance.parent_id = tags.tag_id \
     LEFT JOIN tags AS children ON children.tag_id = tag_inheritance.child_id";

/// Read/write access to tags, inheritance, and tag-to-post associations.
pub struct TagRepo;

impl TagRepo {
    /// Apply a set of tag names to a post, creating missing tag rows.
    /// Idempotent with respect to tags already on the post.
    pub async fn add_tags(
        pool: &PgPool,
        post_id: i64,
        user_id: DbId,
        tags: &[String],
    ) -> Result<(), sqlx::Error> {
        sqlx::query("CALL add_tags($1, $2, $3)")
            .bind(post_id)
            .bind(user_id)
            .bind(tags)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Remove tag associations from a post; tags not on the post are
    /// silently ignored.
    pub async fn remove_tags(
        pool: &PgPool,
        post_id: i64,
        user_id: DbId,
        tags: &[String],
    ) -> Result<(), sqlx::Error> {
        sqlx::query("CALL remove_tags($1, $2, $3)")
            .bind(post_id)
            .bind(user_id)
            .bind(tags)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Insert an inheritance edge. A duplicate edge surfaces as a unique
    /// violation; an edge that would close a cycle surfaces as a check
    /// violation raised by the procedure.
    pub async fn inherit_tag(
        pool: &PgPool,
        user_id: DbId,
        parent: &str,
        child: &str,
        deprecate: bool,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("CALL inherit_tag($1, $2, $3, $4)")
            .bind(user_id)
            .bind(parent)
            .bind(child)
            .bind(deprecate)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Delete an inheritance edge; deleting an absent edge is a no-op.
    pub async fn remove_inheritance(
        pool: &PgPool,
        parent: &str,
        child: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "DELETE FROM tag_inheritance
             USING tags AS parent, tags AS child
             WHERE tag_inheritance.parent_id = parent.tag_id
               AND tag_inheritance.child_id = child.tag_id
               AND parent.name = $1
               AND child.name = $2",
        )
        .bind(parent)
        .bind(child)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Read a tag's ownership row under `FOR UPDATE`, inside the caller's
    /// transaction, so the authorize-then-update sequence is race-free.
    pub async fn fetch_tag_for_update(
        conn: &mut PgConnection,
        name: &str,
    ) -> Result<Option<TagOwnership>, sqlx::Error> {
        sqlx::query_as::<_, TagOwnership>(
            "SELECT owner FROM tags WHERE name = $1 FOR UPDATE",
        )
        .bind(name)
        .fetch_optional(conn)
        .await
    }

    /// Patch a tag row in place. Absent fields keep their value; the class
    /// arm deliberately avoids COALESCE so an unknown class becomes a
    /// not-null violation instead of silently keeping the old class.
    pub async fn update_tag(
        conn: &mut PgConnection,
        name: &str,
        patch: &TagPatch,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE tags SET
                 name = COALESCE($2, name),
                 class_id = CASE WHEN $3::text IS NULL THEN class_id
                                 ELSE tag_class_to_id($3) END,
                 owner = COALESCE($4, owner),
                 description = COALESCE($5, description),
                 deprecated = COALESCE($6, deprecated)
             WHERE name = $1",
        )
        .bind(name)
        .bind(&patch.name)
        .bind(&patch.group)
        .bind(patch.owner)
        .bind(&patch.description)
        .bind(patch.deprecated)
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// The per-post view: uploader, privacy, and non-deprecated tags
    /// grouped by class. `None` means the post does not exist.
    pub async fn fetch_tags_by_post(
        pool: &PgPool,
        post_id: i64,
    ) -> Result<Option<PostTags>, sqlx::Error> {
        let rows = sqlx::query_as::<_, PostTagRow>(
            "SELECT
                 posts.uploader,
                 privacy.type AS privacy,
                 tag_classes.class,
                 array_remove(array_agg(tags.name ORDER BY tags.name), NULL) AS tags
             FROM posts
             INNER JOIN privacy ON privacy.privacy_id = posts.privacy_id
             LEFT JOIN tag_post ON tag_post.post_id = posts.post_id
             LEFT JOIN tags ON tags.tag_id = tag_post.tag_id AND tags.deprecated = false
             LEFT JOIN tag_classes ON tag_classes.class_id = tags.class_id
             WHERE posts.post_id = $1
             GROUP BY posts.post_id, privacy.type, tag_classes.class",
        )
        .bind(post_id)
        .fetch_all(pool)
        .await?;

        PostTags::from_rows(rows)
    }

    /// Fetch one tag with its inherited children.
    pub async fn fetch_tag(pool: &PgPool, name: &str) -> Result<Option<InternalTag>, sqlx::Error> {
        let query = format!(
            "SELECT {TAG_COLUMNS} FROM tags {TAG_JOINS}
             WHERE tags.name = $1
             GROUP BY tags.tag_id, tag_classes.class"
        );
        let row = sqlx::query_as::<_, TagRow>(&query)
            .bind(name)
            .fetch_optional(pool)
            .await?;
        Ok(row.map(InternalTag::from))
    }

    /// All tags owned by a user.
    pub async fn fetch_user_tags(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Vec<InternalTag>, sqlx::Error> {
        let query = format!(
            "SELECT {TAG_COLUMNS} FROM tags {TAG_JOINS}
             WHERE tags.owner = $1
             GROUP BY tags.tag_id, tag_classes.class
             ORDER BY tags.name"
        );
        let rows = sqlx::query_as::<_, TagRow>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await?;
        Ok(rows.into_iter().map(InternalTag::from).collect())
    }

    /// The whole tag table, for the prefix-lookup snapshot.
    pub async fn fetch_all_tags(pool: &PgPool) -> Result<Vec<InternalTag>, sqlx::Error> {
        let query = format!(
            "SELECT {TAG_COLUMNS} FROM tags {TAG_JOINS}
             GROUP BY tags.tag_id, tag_classes.class
             ORDER BY tags.name"
        );
        let rows = sqlx::query_as::<_, TagRow>(&query).fetch_all(pool).await?;
        Ok(rows.into_iter().map(InternalTag::from).collect())
    }

    /// Count of public posts bearing a tag: the counter population query.
    pub async fn count_public_posts(pool: &PgPool, name: &str) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(1)
             FROM tags
             INNER JOIN tag_post ON tag_post.tag_id = tags.tag_id
             INNER JOIN posts ON posts.post_id = tag_post.post_id
             WHERE tags.name = $1
               AND tags.deprecated = false
               AND posts.privacy_id = privacy_to_id('public')",
        )
        .bind(name)
        .fetch_one(pool)
        .await
    }
}
