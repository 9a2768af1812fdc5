//! Process-local snapshot of the whole tag table.
//!
//! Prefix lookup would otherwise pay one full-table query per call; the
//! snapshot amortizes that to one query per TTL window. On expiry,
//! concurrent callers may race to refresh; refreshes are idempotent and
//! the latest write wins.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use tagd_db::models::InternalTag;
use tagd_db::repositories::TagRepo;
use tagd_db::DbPool;

/// How long a snapshot stays fresh.
const SNAPSHOT_TTL: Duration = Duration::from_secs(60);

struct Entry {
    taken: Instant,
    tags: Arc<Vec<InternalTag>>,
}

pub struct TagSnapshot {
    pool: DbPool,
    ttl: Duration,
    inner: RwLock<Option<Entry>>,
}

impl TagSnapshot {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            ttl: SNAPSHOT_TTL,
            inner: RwLock::new(None),
        }
    }

    /// The current snapshot, refreshed from the database if stale.
    pub async fn tags(&self) -> Result<Arc<Vec<InternalTag>>, sqlx::Error> {
        if let Some(entry) = self.inner.read().await.as_ref() {
            if self.is_fresh(entry) {
                return Ok(Arc::clone(&entry.tags));
            }
        }

        let tags = Arc::new(TagRepo::fetch_all_tags(&self.pool).await?);
        *self.inner.write().await = Some(Entry {
            taken: Instant::now(),
            tags: Arc::clone(&tags),
        });
        Ok(tags)
    }

    fn is_fresh(&self, entry: &Entry) -> bool {
        entry.taken.elapsed() < self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_with_ttl(ttl: Duration) -> TagSnapshot {
        TagSnapshot {
            pool: DbPool::connect_lazy("postgres://localhost:1/unreachable").unwrap(),
            ttl,
            inner: RwLock::new(None),
        }
    }

    fn internal(name: &str) -> InternalTag {
        InternalTag {
            name: name.to_owned(),
            group: "misc".to_owned(),
            owner: None,
            deprecated: false,
            inherited_tags: Vec::new(),
            description: None,
        }
    }

    #[tokio::test]
    async fn fresh_entry_served_without_database() {
        let snapshot = snapshot_with_ttl(Duration::from_secs(60));
        *snapshot.inner.write().await = Some(Entry {
            taken: Instant::now(),
            tags: Arc::new(vec![internal("fox")]),
        });

        // The pool is unreachable, so this succeeding proves the cached
        // entry was served.
        let tags = snapshot.tags().await.unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].name, "fox");
    }

    #[tokio::test]
    async fn zero_ttl_entry_is_stale() {
        let snapshot = snapshot_with_ttl(Duration::ZERO);
        let entry = Entry {
            taken: Instant::now(),
            tags: Arc::new(Vec::new()),
        };
        assert!(!snapshot.is_fresh(&entry));
    }
}
