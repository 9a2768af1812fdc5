//! Key-value store seam.
//!
//! [`KvStore`] is the object-safe contract the cache and counter layers
//! are written against: byte values with per-key TTL, plus the atomic
//! integer operations the counters need. [`RedisStore`] is the production
//! backend; [`MemoryStore`] serves tests and single-node development.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KvError {
    /// The backend was unreachable or refused the operation.
    #[error("key-value store error: {0}")]
    Backend(String),

    /// The stored bytes under a key did not decode as the expected type.
    #[error("value under '{key}' failed to decode: {reason}")]
    Decode { key: String, reason: String },
}

impl From<redis::RedisError> for KvError {
    fn from(err: redis::RedisError) -> Self {
        KvError::Backend(err.to_string())
    }
}

/// Object-safe key-value operations.
///
/// Integer values (the counters) are stored in their decimal string form
/// so [`KvStore::incr`] composes with [`KvStore::put_if_absent`] on every
/// backend.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KvError>;

    /// Store `value` under `key`. `None` means no expiry.
    async fn put(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<(), KvError>;

    async fn remove(&self, key: &str) -> Result<(), KvError>;

    async fn exists(&self, key: &str) -> Result<bool, KvError>;

    /// Store an integer under `key` only if the key is absent, with no
    /// expiry. Returns whether this call performed the write.
    async fn put_if_absent(&self, key: &str, value: i64) -> Result<bool, KvError>;

    /// Atomically add `delta` to the integer under `key`, returning the
    /// new value. A missing key counts as zero.
    async fn incr(&self, key: &str, delta: i64) -> Result<i64, KvError>;
}

/// Serialize a cache value to its stored byte form.
pub fn encode<T: Serialize>(key: &str, value: &T) -> Result<Vec<u8>, KvError> {
    serde_json::to_vec(value).map_err(|e| KvError::Decode {
        key: key.to_owned(),
        reason: e.to_string(),
    })
}

/// Deserialize a stored byte form.
pub fn decode<T: DeserializeOwned>(key: &str, bytes: &[u8]) -> Result<T, KvError> {
    serde_json::from_slice(bytes).map_err(|e| KvError::Decode {
        key: key.to_owned(),
        reason: e.to_string(),
    })
}

/// Redis-backed store over a multiplexed [`ConnectionManager`].
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connect to redis at `url` and start the connection manager.
    pub async fn connect(url: &str) -> Result<Self, KvError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KvError> {
        let mut conn = self.conn.clone();
        Ok(conn.get(key).await?)
    }

    async fn put(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<(), KvError> {
        let mut conn = self.conn.clone();
        match ttl {
            Some(ttl) => conn.set_ex::<_, _, ()>(key, value, ttl.as_secs()).await?,
            None => conn.set::<_, _, ()>(key, value).await?,
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), KvError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, KvError> {
        let mut conn = self.conn.clone();
        Ok(conn.exists(key).await?)
    }

    async fn put_if_absent(&self, key: &str, value: i64) -> Result<bool, KvError> {
        let mut conn = self.conn.clone();
        Ok(conn.set_nx(key, value).await?)
    }

    async fn incr(&self, key: &str, delta: i64) -> Result<i64, KvError> {
        let mut conn = self.conn.clone();
        Ok(conn.incr(key, delta).await?)
    }
}

/// Process-local store for tests and single-node development.
///
/// TTLs are accepted and ignored; entries live until removed.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KvError> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn put(&self, key: &str, value: Vec<u8>, _ttl: Option<Duration>) -> Result<(), KvError> {
        self.entries.lock().unwrap().insert(key.to_owned(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), KvError> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, KvError> {
        Ok(self.entries.lock().unwrap().contains_key(key))
    }

    async fn put_if_absent(&self, key: &str, value: i64) -> Result<bool, KvError> {
        let mut entries = self.entries.lock().unwrap();
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(key.to_owned(), value.to_string().into_bytes());
        Ok(true)
    }

    async fn incr(&self, key: &str, delta: i64) -> Result<i64, KvError> {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries.entry(key.to_owned()).or_insert_with(|| b"0".to_vec());
        let current: i64 = std::str::from_utf8(entry)
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .ok_or_else(|| KvError::Decode {
                key: key.to_owned(),
                reason: "stored value is not an integer".into(),
            })?;
        let next = current + delta;
        *entry = next.to_string().into_bytes();
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_remove_round_trip() {
        let store = MemoryStore::new();
        store.put("k", b"v".to_vec(), None).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(b"v".to_vec()));
        assert!(store.exists("k").await.unwrap());

        store.remove("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(!store.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn put_if_absent_only_writes_once() {
        let store = MemoryStore::new();
        assert!(store.put_if_absent("n", 5).await.unwrap());
        assert!(!store.put_if_absent("n", 9).await.unwrap());
        assert_eq!(store.incr("n", 0).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn incr_treats_missing_key_as_zero() {
        let store = MemoryStore::new();
        assert_eq!(store.incr("c", 3).await.unwrap(), 3);
        assert_eq!(store.incr("c", -1).await.unwrap(), 2);
    }
}
