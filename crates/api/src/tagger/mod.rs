//! The tag orchestrator: every public operation runs through here.
//!
//! Coordinates the repository, the cache and counter stores, the snapshot,
//! and the directory clients. The ordering inside a mutation is fixed:
//! SQL mutation, then the post-privacy read, then counter deltas, then
//! cache invalidation. Counter and cache failures are logged and never
//! surfaced.

pub mod projection;

use std::collections::BTreeSet;
use std::sync::Arc;

use futures::future::join_all;

use tagd_cache::{CounterStore, KvStore, TagCache, TagSnapshot};
use tagd_core::auth::{self, Scope, UserAuth};
use tagd_core::error::CoreError;
use tagd_core::frequent;
use tagd_core::tag::{normalize_tag, normalize_tags, validate_description, Tag, TagGroups};
use tagd_core::types::PostId;
use tagd_db::models::{InternalTag, PostTags, TagPatch};
use tagd_db::repositories::TagRepo;
use tagd_db::DbPool;
use tagd_directory::{DirectoryError, PostDirectory, UserDirectory};

use crate::error::{AppError, AppResult};

use projection::Projection;

/// Fields a tag update may carry. Absent fields are no-ops; the owner is a
/// handle resolved through the user directory before the statement runs.
#[derive(Debug, Clone, Default)]
pub struct TagUpdate {
    pub name: Option<String>,
    pub group: Option<String>,
    pub owner: Option<String>,
    pub description: Option<String>,
    pub deprecated: Option<bool>,
}

impl TagUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.group.is_none()
            && self.owner.is_none()
            && self.description.is_none()
            && self.deprecated.is_none()
    }
}

pub struct Tagger {
    pool: DbPool,
    cache: TagCache,
    counters: CounterStore,
    snapshot: TagSnapshot,
    users: UserDirectory,
    posts: PostDirectory,
    projection: Projection,
}

impl Tagger {
    pub fn new(
        pool: DbPool,
        kv: Arc<dyn KvStore>,
        users: UserDirectory,
        posts: PostDirectory,
    ) -> Self {
        let counters = CounterStore::new(Arc::clone(&kv), pool.clone());
        Self {
            cache: TagCache::new(kv),
            snapshot: TagSnapshot::new(pool.clone()),
            projection: Projection::new(users.clone(), counters.clone()),
            counters,
            users,
            posts,
            pool,
        }
    }

    // ---- mutations ----

    /// Apply tags to a post. Counters move only for tags whose membership
    /// actually changed, and only while the post is public.
    pub async fn add_tags(
        &self,
        user: &UserAuth,
        post_id: &PostId,
        tags: &[String],
    ) -> AppResult<()> {
        let user_id = user.require_authenticated()?;
        let tags = normalize_tags(tags)?;
        let tag_list: Vec<String> = tags.iter().cloned().collect();

        let existing = self.pre_write_tag_set(post_id).await?;

        TagRepo::add_tags(&self.pool, post_id.as_int(), user_id, &tag_list).await?;

        let view = self.post_view(post_id).await?;
        if view.privacy.is_public() {
            for tag in newly_added(&tags, &existing) {
                if let Err(err) = self.counters.increment(&tag).await {
                    tracing::warn!(tag = %tag, error = %err, "counter increment failed");
                }
            }
        }

        self.invalidate_post(post_id).await;
        Ok(())
    }

    /// Remove tags from a post. Only tags that were actually on the post
    /// decrement their counter, and only while the post is public.
    pub async fn remove_tags(
        &self,
        user: &UserAuth,
        post_id: &PostId,
        tags: &[String],
    ) -> AppResult<()> {
        let user_id = user.require_authenticated()?;
        let tags = normalize_tags(tags)?;
        let tag_list: Vec<String> = tags.iter().cloned().collect();

        let existing = self.pre_write_tag_set(post_id).await?;

        TagRepo::remove_tags(&self.pool, post_id.as_int(), user_id, &tag_list).await?;

        let view = self.post_view(post_id).await?;
        if view.privacy.is_public() {
            for tag in actually_removed(&tags, &existing) {
                if let Err(err) = self.counters.decrement(&tag).await {
                    tracing::warn!(tag = %tag, error = %err, "counter decrement failed");
                }
            }
        }

        self.invalidate_post(post_id).await;
        Ok(())
    }

    /// Declare that `parent` inherits `child`, optionally deprecating the
    /// child. Admin only.
    pub async fn inherit_tag(
        &self,
        user: &UserAuth,
        parent: &str,
        child: &str,
        deprecate: bool,
    ) -> AppResult<()> {
        let user_id = user.require_authenticated()?;
        if !auth::may_inherit(user) {
            return Err(forbidden("only administrators may manage tag inheritance"));
        }
        let parent = normalize_tag(parent)?;
        let child = normalize_tag(child)?;

        TagRepo::inherit_tag(&self.pool, user_id, &parent, &child, deprecate).await?;

        // Patch the hot parent entry in place; per-post entries expire on
        // their own.
        if let Err(err) = self.cache.append_inherited(&parent, &child).await {
            tracing::warn!(parent = %parent, child = %child, error = %err, "parent cache patch failed");
        }
        if deprecate {
            if let Err(err) = self.cache.remove_tag(&child).await {
                tracing::warn!(child = %child, error = %err, "child cache invalidation failed");
            }
        }
        Ok(())
    }

    /// Remove an inheritance edge. Admin only; removing an absent edge is
    /// a no-op.
    pub async fn remove_inheritance(
        &self,
        user: &UserAuth,
        parent: &str,
        child: &str,
    ) -> AppResult<()> {
        user.require_authenticated()?;
        if !auth::may_remove_inheritance(user) {
            return Err(forbidden("only administrators may manage tag inheritance"));
        }
        let parent = normalize_tag(parent)?;
        let child = normalize_tag(child)?;

        TagRepo::remove_inheritance(&self.pool, &parent, &child).await?;

        if let Err(err) = self.cache.remove_inherited(&parent, &child).await {
            tracing::warn!(parent = %parent, child = %child, error = %err, "parent cache patch failed");
        }
        Ok(())
    }

    /// Patch a tag. Owner-or-moderator gated; touching the deprecation
    /// flag additionally requires moderator. Runs in a transaction so the
    /// authorization read and the update see the same row. Authorization
    /// comes first: field validation and the owner-handle resolution run
    /// only for callers allowed to edit the tag.
    pub async fn update_tag(&self, user: &UserAuth, name: &str, update: TagUpdate) -> AppResult<()> {
        user.require_authenticated()?;
        let name = normalize_tag(name)?;

        if update.is_empty() {
            return Err(CoreError::BadRequest("a tag update requires at least one field".into()).into());
        }

        let mut tx = self.pool.begin().await?;
        let current = TagRepo::fetch_tag_for_update(&mut *tx, &name)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("tag '{name}' does not exist")))?;
        if !auth::may_edit(user, current.owner) {
            return Err(forbidden("you do not own this tag"));
        }
        if update.deprecated.is_some() && !auth::may_edit_deprecation(user) {
            return Err(forbidden("only moderators may change a tag's deprecation"));
        }

        let owner = match &update.owner {
            Some(handle) => {
                let resolved = self.users.fetch_user(handle).await.map_err(|err| match err {
                    DirectoryError::NotFound { .. } => AppError::Core(CoreError::BadRequest(
                        format!("unknown owner handle '{handle}'"),
                    )),
                    other => other.into(),
                })?;
                Some(resolved.user_id)
            }
            None => None,
        };
        if let Some(description) = &update.description {
            validate_description(description)?;
        }
        let new_name = update.name.as_deref().map(normalize_tag).transpose()?;

        let patch = TagPatch {
            name: new_name.clone(),
            group: update.group.map(|g| g.trim().to_lowercase()),
            owner,
            description: update.description,
            deprecated: update.deprecated,
        };
        TagRepo::update_tag(&mut *tx, &name, &patch).await?;
        tx.commit().await?;

        self.refresh_tag_cache(&name, new_name.as_deref()).await;
        Ok(())
    }

    // ---- reads ----

    /// The tags of one post, grouped by class, gated by post visibility.
    /// A post the caller may not see reads as missing.
    pub async fn fetch_tags_by_post(
        &self,
        user: &UserAuth,
        post_id: &PostId,
    ) -> AppResult<TagGroups> {
        let (groups, post) = tokio::join!(
            self.post_groups(post_id),
            self.posts.fetch_post(post_id, user.token.as_deref())
        );

        let post = post.map_err(|err| match err {
            DirectoryError::NotFound { .. } => post_not_found(post_id),
            other => other.into(),
        })?;
        if !auth::may_see_post_tags(user, post.privacy, post.uploader) {
            return Err(post_not_found(post_id));
        }
        groups
    }

    /// The per-post listing for other platform services; skips the
    /// visibility gate but requires the internal scope.
    pub async fn internal_tags_by_post(
        &self,
        user: &UserAuth,
        post_id: &PostId,
    ) -> AppResult<TagGroups> {
        if !user.has_scope(Scope::Internal) {
            return Err(if user.authenticated() {
                forbidden("this route is reserved for internal services")
            } else {
                CoreError::Unauthorized("this route requires service credentials".into()).into()
            });
        }
        self.post_groups(post_id).await
    }

    /// One tag in its public form.
    pub async fn fetch_tag(&self, name: &str) -> AppResult<Tag> {
        let name = normalize_tag(name)?;
        let internal = self.internal_tag(&name).await?;
        Ok(self.projection.tag(internal).await)
    }

    /// Prefix lookup over the snapshot. An empty prefix returns all tags.
    pub async fn tag_lookup(&self, prefix: Option<&str>) -> AppResult<Vec<Tag>> {
        let prefix = prefix.unwrap_or_default().trim().to_lowercase();
        let all = self.snapshot.tags().await?;

        let matches: Vec<InternalTag> = all
            .iter()
            .filter(|tag| tag.name.starts_with(&prefix))
            .cloned()
            .collect();

        Ok(join_all(matches.into_iter().map(|tag| self.projection.tag(tag))).await)
    }

    /// All tags owned by the user behind `handle`. A user owning no tags
    /// reads as missing.
    pub async fn fetch_tags_by_user(&self, handle: &str) -> AppResult<Vec<Tag>> {
        let owner = self.users.fetch_user(handle).await.map_err(|err| match err {
            DirectoryError::NotFound { .. } => {
                AppError::Core(CoreError::NotFound(format!("user '{handle}' does not exist")))
            }
            other => other.into(),
        })?;

        let tags = match self.cache.user_tags(owner.user_id).await {
            Some(tags) => tags,
            None => {
                let tags = TagRepo::fetch_user_tags(&self.pool, owner.user_id).await?;
                if let Err(err) = self.cache.put_user_tags(owner.user_id, &tags).await {
                    tracing::warn!(user_id = owner.user_id, error = %err, "user tag cache write failed");
                }
                tags
            }
        };

        if tags.is_empty() {
            return Err(CoreError::NotFound(format!("user '{handle}' owns no tags")).into());
        }
        Ok(join_all(tags.into_iter().map(|tag| self.projection.tag(tag))).await)
    }

    /// The caller's most-used tags across their recent posts, per class.
    pub async fn frequently_used(&self, user: &UserAuth) -> AppResult<TagGroups> {
        let user_id = user.require_authenticated()?;
        if let Some(groups) = self.cache.frequent(user_id).await {
            return Ok(groups);
        }

        let token = user
            .token
            .as_deref()
            .ok_or_else(|| CoreError::Unauthorized("this operation requires authentication".into()))?;
        let recent = self.posts.user_posts(token).await?;

        let fetched = join_all(recent.iter().map(|post| self.post_groups(&post.post_id))).await;
        let per_post: Vec<TagGroups> = recent
            .iter()
            .zip(fetched)
            .filter_map(|(post, result)| match result {
                Ok(groups) => Some(groups),
                Err(err) => {
                    tracing::warn!(post_id = %post.post_id, error = %err, "skipping post in aggregation");
                    None
                }
            })
            .collect();

        let used = frequent::most_used(per_post);
        if let Err(err) = self.cache.put_frequent(user_id, &used).await {
            tracing::warn!(user_id, error = %err, "frequently-used cache write failed");
        }
        Ok(used)
    }

    // ---- internals ----

    /// The post's tag set before a mutation: the cached entry when warm,
    /// otherwise a repository read, which also rejects an unknown post
    /// before any mutation runs.
    async fn pre_write_tag_set(&self, post_id: &PostId) -> AppResult<BTreeSet<String>> {
        if let Some(groups) = self.cache.post(post_id).await {
            return Ok(groups.tag_set());
        }
        Ok(self.post_view(post_id).await?.groups.tag_set())
    }

    async fn post_view(&self, post_id: &PostId) -> AppResult<PostTags> {
        TagRepo::fetch_tags_by_post(&self.pool, post_id.as_int())
            .await?
            .ok_or_else(|| post_not_found(post_id))
    }

    /// Cache-through read of a post's tag groups.
    async fn post_groups(&self, post_id: &PostId) -> AppResult<TagGroups> {
        if let Some(groups) = self.cache.post(post_id).await {
            return Ok(groups);
        }
        let view = self.post_view(post_id).await?;
        if let Err(err) = self.cache.put_post(post_id, &view.groups).await {
            tracing::warn!(post_id = %post_id, error = %err, "post cache write failed");
        }
        Ok(view.groups)
    }

    /// Cache-through read of a tag's internal form.
    async fn internal_tag(&self, name: &str) -> AppResult<InternalTag> {
        if let Some(tag) = self.cache.tag(name).await {
            return Ok(tag);
        }
        let tag = TagRepo::fetch_tag(&self.pool, name)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("tag '{name}' does not exist")))?;
        if let Err(err) = self.cache.put_tag(&tag).await {
            tracing::warn!(tag = %tag.name, error = %err, "tag cache write failed");
        }
        Ok(tag)
    }

    async fn invalidate_post(&self, post_id: &PostId) {
        if let Err(err) = self.cache.remove_post(post_id).await {
            tracing::warn!(post_id = %post_id, error = %err, "post cache invalidation failed");
        }
    }

    /// Rewrite the tag's cache entry after an update. On rename the old
    /// key is removed before the new entry is written.
    async fn refresh_tag_cache(&self, old_name: &str, new_name: Option<&str>) {
        let fresh_name = new_name.unwrap_or(old_name);
        if fresh_name != old_name {
            if let Err(err) = self.cache.remove_tag(old_name).await {
                tracing::warn!(tag = old_name, error = %err, "stale tag cache removal failed");
            }
        }
        match TagRepo::fetch_tag(&self.pool, fresh_name).await {
            Ok(Some(tag)) => {
                if let Err(err) = self.cache.put_tag(&tag).await {
                    tracing::warn!(tag = %tag.name, error = %err, "tag cache write failed");
                }
            }
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(tag = fresh_name, error = %err, "tag cache refresh read failed");
            }
        }
    }
}

fn forbidden(message: &str) -> AppError {
    AppError::Core(CoreError::Forbidden(message.into()))
}

/// Missing post and invisible post are deliberately indistinguishable.
fn post_not_found(post_id: &PostId) -> AppError {
    AppError::Core(CoreError::NotFound(format!("post '{post_id}' does not exist")))
}

/// Tags whose membership a set-add actually changes.
fn newly_added(requested: &BTreeSet<String>, existing: &BTreeSet<String>) -> Vec<String> {
    requested.difference(existing).cloned().collect()
}

/// Tags whose membership a set-remove actually changes.
fn actually_removed(requested: &BTreeSet<String>, existing: &BTreeSet<String>) -> Vec<String> {
    requested.intersection(existing).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(tags: &[&str]) -> BTreeSet<String> {
        tags.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn newly_added_excludes_already_present_tags() {
        let added = newly_added(&set(&["fox", "forest"]), &set(&["fox"]));
        assert_eq!(added, vec!["forest"]);
    }

    #[test]
    fn newly_added_on_untagged_post_is_everything() {
        let added = newly_added(&set(&["fox", "forest"]), &set(&[]));
        assert_eq!(added, vec!["forest", "fox"]);
    }

    #[test]
    fn actually_removed_excludes_absent_tags() {
        let removed = actually_removed(&set(&["fox", "river"]), &set(&["fox", "forest"]));
        assert_eq!(removed, vec!["fox"]);
    }

    #[test]
    fn empty_update_detected() {
        assert!(TagUpdate::default().is_empty());
        assert!(!TagUpdate {
            deprecated: Some(true),
            ..TagUpdate::default()
        }
        .is_empty());
    }
}
