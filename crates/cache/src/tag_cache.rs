//! Durable cache for tag records and tag groupings.
//!
//! Four key spaces: `tag:{name}` holds the internal tag record,
//! `post:{post_id}` the per-post groupings, `user:{user_id}` the tags a
//! user owns, and `freq:{user_id}` the frequently-used result. Values are
//! JSON; a value that fails to decode is treated as a miss. The per-post
//! space gets a short TTL because inheritance changes are not propagated
//! back into it.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use tagd_core::tag::TagGroups;
use tagd_core::types::{DbId, PostId};
use tagd_db::models::InternalTag;

use crate::kv::{decode, encode, KvError, KvStore};

/// Default TTL for tag, user, and frequently-used entries.
const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

/// Per-post entries expire quickly instead of being patched on
/// inheritance changes.
const POST_TTL: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct TagCache {
    kv: Arc<dyn KvStore>,
}

impl TagCache {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    fn tag_key(name: &str) -> String {
        format!("tag:{name}")
    }

    fn post_key(post_id: &PostId) -> String {
        format!("post:{post_id}")
    }

    fn user_key(user_id: DbId) -> String {
        format!("user:{user_id}")
    }

    fn freq_key(user_id: DbId) -> String {
        format!("freq:{user_id}")
    }

    // ---- tag:{name} ----

    pub async fn tag(&self, name: &str) -> Option<InternalTag> {
        self.read(&Self::tag_key(name)).await
    }

    pub async fn put_tag(&self, tag: &InternalTag) -> Result<(), KvError> {
        self.write(&Self::tag_key(&tag.name), tag, DEFAULT_TTL).await
    }

    pub async fn remove_tag(&self, name: &str) -> Result<(), KvError> {
        self.kv.remove(&Self::tag_key(name)).await
    }

    /// Append `child` to the cached parent record, if one is cached.
    pub async fn append_inherited(&self, parent: &str, child: &str) -> Result<(), KvError> {
        if let Some(mut tag) = self.tag(parent).await {
            if !tag.inherited_tags.iter().any(|t| t == child) {
                tag.inherited_tags.push(child.to_owned());
                tag.inherited_tags.sort();
                self.put_tag(&tag).await?;
            }
        }
        Ok(())
    }

    /// Drop `child` from the cached parent record, if one is cached.
    pub async fn remove_inherited(&self, parent: &str, child: &str) -> Result<(), KvError> {
        if let Some(mut tag) = self.tag(parent).await {
            tag.inherited_tags.retain(|t| t != child);
            self.put_tag(&tag).await?;
        }
        Ok(())
    }

    // ---- post:{post_id} ----

    pub async fn post(&self, post_id: &PostId) -> Option<TagGroups> {
        self.read(&Self::post_key(post_id)).await
    }

    pub async fn put_post(&self, post_id: &PostId, groups: &TagGroups) -> Result<(), KvError> {
        self.write(&Self::post_key(post_id), groups, POST_TTL).await
    }

    pub async fn remove_post(&self, post_id: &PostId) -> Result<(), KvError> {
        self.kv.remove(&Self::post_key(post_id)).await
    }

    // ---- user:{user_id} ----

    pub async fn user_tags(&self, user_id: DbId) -> Option<Vec<InternalTag>> {
        self.read(&Self::user_key(user_id)).await
    }

    pub async fn put_user_tags(
        &self,
        user_id: DbId,
        tags: &[InternalTag],
    ) -> Result<(), KvError> {
        self.write(&Self::user_key(user_id), &tags, DEFAULT_TTL).await
    }

    // ---- freq:{user_id} ----

    pub async fn frequent(&self, user_id: DbId) -> Option<TagGroups> {
        self.read(&Self::freq_key(user_id)).await
    }

    pub async fn put_frequent(&self, user_id: DbId, groups: &TagGroups) -> Result<(), KvError> {
        self.write(&Self::freq_key(user_id), groups, DEFAULT_TTL).await
    }

    // ---- internals ----

    /// Read and decode; backend errors and undecodable values are logged
    /// and served as misses so reads never fail a request.
    async fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.kv.get(key).await {
            Ok(Some(bytes)) => match decode(key, &bytes) {
                Ok(value) => Some(value),
                Err(err) => {
                    tracing::warn!(key, error = %err, "discarding undecodable cache entry");
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(key, error = %err, "cache read failed");
                None
            }
        }
    }

    async fn write<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> Result<(), KvError> {
        let bytes = encode(key, value)?;
        self.kv.put(key, bytes, Some(ttl)).await
    }
}

#[cfg(test)]
mod tests {
    use crate::kv::MemoryStore;

    use super::*;

    fn cache() -> TagCache {
        TagCache::new(Arc::new(MemoryStore::new()))
    }

    fn internal(name: &str, inherited: &[&str]) -> InternalTag {
        InternalTag {
            name: name.to_owned(),
            group: "misc".to_owned(),
            owner: None,
            deprecated: false,
            inherited_tags: inherited.iter().map(|s| s.to_string()).collect(),
            description: None,
        }
    }

    #[tokio::test]
    async fn tag_round_trip_and_removal() {
        let cache = cache();
        let tag = internal("fox", &[]);

        assert!(cache.tag("fox").await.is_none());
        cache.put_tag(&tag).await.unwrap();
        assert_eq!(cache.tag("fox").await, Some(tag));

        cache.remove_tag("fox").await.unwrap();
        assert!(cache.tag("fox").await.is_none());
    }

    #[tokio::test]
    async fn append_inherited_patches_cached_parent() {
        let cache = cache();
        cache.put_tag(&internal("canine", &["wolf"])).await.unwrap();

        cache.append_inherited("canine", "dog").await.unwrap();
        let patched = cache.tag("canine").await.unwrap();
        assert_eq!(patched.inherited_tags, vec!["dog", "wolf"]);

        // A second append of the same child is a no-op.
        cache.append_inherited("canine", "dog").await.unwrap();
        assert_eq!(cache.tag("canine").await.unwrap().inherited_tags, vec!["dog", "wolf"]);
    }

    #[tokio::test]
    async fn append_inherited_without_cached_parent_is_noop() {
        let cache = cache();
        cache.append_inherited("canine", "dog").await.unwrap();
        assert!(cache.tag("canine").await.is_none());
    }

    #[tokio::test]
    async fn remove_inherited_patches_cached_parent() {
        let cache = cache();
        cache.put_tag(&internal("canine", &["dog", "wolf"])).await.unwrap();

        cache.remove_inherited("canine", "dog").await.unwrap();
        assert_eq!(cache.tag("canine").await.unwrap().inherited_tags, vec!["wolf"]);
    }

    #[tokio::test]
    async fn corrupt_entry_reads_as_miss() {
        let kv = Arc::new(MemoryStore::new());
        kv.put("tag:fox", b"not json".to_vec(), None).await.unwrap();

        let cache = TagCache::new(kv);
        assert!(cache.tag("fox").await.is_none());
    }

    #[tokio::test]
    async fn post_groups_round_trip() {
        let cache = cache();
        let post_id = PostId::parse("AAAAAAAA").unwrap();
        let groups = TagGroups::from_pairs([
            ("misc".to_string(), "fox".to_string()),
            ("misc".to_string(), "forest".to_string()),
        ]);

        cache.put_post(&post_id, &groups).await.unwrap();
        assert_eq!(cache.post(&post_id).await, Some(groups));

        cache.remove_post(&post_id).await.unwrap();
        assert!(cache.post(&post_id).await.is_none());
    }

    #[tokio::test]
    async fn user_and_frequent_round_trip() {
        let cache = cache();
        let owned = vec![internal("fox", &[])];
        cache.put_user_tags(9, &owned).await.unwrap();
        assert_eq!(cache.user_tags(9).await, Some(owned));

        let freq = TagGroups::from_pairs([("misc".to_string(), "fox".to_string())]);
        cache.put_frequent(9, &freq).await.unwrap();
        assert_eq!(cache.frequent(9).await, Some(freq));
    }
}
