//! Per-tag public-use counters.
//!
//! Counters live under `cnt:{tag}` with no expiry and track how many
//! public posts bear each tag. They are advisory: callers treat drift as
//! recoverable, and a counter is rebuilt from the relational store the
//! first time it is read after an eviction.

use std::sync::Arc;

use thiserror::Error;

use tagd_db::repositories::TagRepo;
use tagd_db::DbPool;

use crate::kv::{KvError, KvStore};

const KEY_PREFIX: &str = "cnt:";

/// Attempts for one atomic add before giving up.
const MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Error)]
pub enum CounterError {
    #[error(transparent)]
    Kv(#[from] KvError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The atomic add kept failing; the counter may be behind by one.
    #[error("counter update for '{tag}' failed after {attempts} attempts")]
    Transient { tag: String, attempts: u32 },
}

/// Atomic per-tag counters over a [`KvStore`], populated on miss from the
/// public-post count query.
#[derive(Clone)]
pub struct CounterStore {
    kv: Arc<dyn KvStore>,
    pool: DbPool,
}

impl CounterStore {
    pub fn new(kv: Arc<dyn KvStore>, pool: DbPool) -> Self {
        Self { kv, pool }
    }

    fn key(tag: &str) -> String {
        format!("{KEY_PREFIX}{tag}")
    }

    /// Current count for `tag`, populating from the database on miss.
    pub async fn get(&self, tag: &str) -> Result<i64, CounterError> {
        let key = Self::key(tag);
        if let Some(bytes) = self.kv.get(&key).await? {
            return Ok(parse_count(&key, &bytes)?);
        }
        self.populate(tag).await
    }

    /// Record one more public post bearing `tag`.
    pub async fn increment(&self, tag: &str) -> Result<i64, CounterError> {
        self.apply_delta(tag, 1).await
    }

    /// Record one fewer public post bearing `tag`. The stored value is
    /// re-seated at zero if a racing decrement drove it negative.
    pub async fn decrement(&self, tag: &str) -> Result<i64, CounterError> {
        self.apply_delta(tag, -1).await
    }

    /// Run the population query and install the result if no other
    /// populator won the race.
    async fn populate(&self, tag: &str) -> Result<i64, CounterError> {
        let key = Self::key(tag);
        let count = TagRepo::count_public_posts(&self.pool, tag).await?;
        if self.kv.put_if_absent(&key, count).await? {
            return Ok(count);
        }
        match self.kv.get(&key).await? {
            Some(bytes) => Ok(parse_count(&key, &bytes)?),
            None => Ok(count),
        }
    }

    async fn apply_delta(&self, tag: &str, delta: i64) -> Result<i64, CounterError> {
        let key = Self::key(tag);
        if !self.kv.exists(&key).await? {
            self.populate(tag).await?;
        }

        let mut attempts = 0;
        while attempts < MAX_ATTEMPTS {
            attempts += 1;
            match self.kv.incr(&key, delta).await {
                Ok(value) if value < 0 => {
                    tracing::warn!(tag, value, "counter went negative, re-seating at zero");
                    self.kv.put(&key, b"0".to_vec(), None).await?;
                    return Ok(0);
                }
                Ok(value) => return Ok(value),
                Err(err) => {
                    tracing::warn!(tag, attempts, error = %err, "counter update attempt failed");
                }
            }
        }
        Err(CounterError::Transient {
            tag: tag.to_owned(),
            attempts,
        })
    }
}

fn parse_count(key: &str, bytes: &[u8]) -> Result<i64, KvError> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .ok_or_else(|| KvError::Decode {
            key: key.to_owned(),
            reason: "stored counter is not an integer".into(),
        })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::kv::MemoryStore;

    use super::*;

    /// Pool handle that never connects; tests pre-seed every counter so
    /// the population query is never reached.
    fn lazy_pool() -> DbPool {
        DbPool::connect_lazy("postgres://localhost:1/unreachable").unwrap()
    }

    async fn seeded(tag: &str, value: i64) -> CounterStore {
        let kv = Arc::new(MemoryStore::new());
        kv.put_if_absent(&CounterStore::key(tag), value).await.unwrap();
        CounterStore::new(kv, lazy_pool())
    }

    #[tokio::test]
    async fn get_returns_seeded_value() {
        let counters = seeded("fox", 4).await;
        assert_eq!(counters.get("fox").await.unwrap(), 4);
    }

    #[tokio::test]
    async fn increment_and_decrement_are_symmetric() {
        let counters = seeded("fox", 1).await;
        assert_eq!(counters.increment("fox").await.unwrap(), 2);
        assert_eq!(counters.decrement("fox").await.unwrap(), 1);
        assert_eq!(counters.get("fox").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn decrement_clamps_at_zero() {
        let counters = seeded("fox", 0).await;
        assert_eq!(counters.decrement("fox").await.unwrap(), 0);
        assert_eq!(counters.get("fox").await.unwrap(), 0);
    }

    /// Store whose atomic add always fails, for the retry path.
    struct FailingIncr(MemoryStore);

    #[async_trait]
    impl KvStore for FailingIncr {
        async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KvError> {
            self.0.get(key).await
        }
        async fn put(
            &self,
            key: &str,
            value: Vec<u8>,
            ttl: Option<Duration>,
        ) -> Result<(), KvError> {
            self.0.put(key, value, ttl).await
        }
        async fn remove(&self, key: &str) -> Result<(), KvError> {
            self.0.remove(key).await
        }
        async fn exists(&self, key: &str) -> Result<bool, KvError> {
            self.0.exists(key).await
        }
        async fn put_if_absent(&self, key: &str, value: i64) -> Result<bool, KvError> {
            self.0.put_if_absent(key, value).await
        }
        async fn incr(&self, _key: &str, _delta: i64) -> Result<i64, KvError> {
            Err(KvError::Backend("conflict".into()))
        }
    }

    #[tokio::test]
    async fn retries_exhaust_into_transient_error() {
        let kv = Arc::new(FailingIncr(MemoryStore::new()));
        kv.put_if_absent(&CounterStore::key("fox"), 1).await.unwrap();
        let counters = CounterStore::new(kv, lazy_pool());

        match counters.increment("fox").await {
            Err(CounterError::Transient { attempts, .. }) => assert_eq!(attempts, MAX_ATTEMPTS),
            other => panic!("expected transient error, got {other:?}"),
        }
    }
}
