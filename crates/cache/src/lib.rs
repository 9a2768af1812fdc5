//! Cache layer: the key-value store seam, per-tag public-use counters,
//! the durable tag/post/user cache, and the process-local snapshot that
//! serves prefix lookup.

pub mod counter;
pub mod kv;
pub mod snapshot;
pub mod tag_cache;

pub use counter::CounterStore;
pub use kv::{KvError, KvStore, MemoryStore, RedisStore};
pub use snapshot::TagSnapshot;
pub use tag_cache::TagCache;
