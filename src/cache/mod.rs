//! Tiered cache
//!
//! In-memory tier in front of a persistent key/value tier (SQLite by
//! default), with per-entry TTL, lazy expiry, insertion-order eviction and
//! pattern invalidation.

mod cached;
mod entry;
mod key;
mod sqlite;
mod store;
mod tiered;

pub use cached::cached;
pub use entry::{now_millis, CacheEntry};
pub use key::CacheKey;
pub use sqlite::{EntryCounts, SqliteStore, SqliteStoreConfig};
pub use store::{storage_key, MemoryStore, PersistentStore, STORAGE_PREFIX};
pub use tiered::{CacheStats, SetOptions, TieredCache, DEFAULT_MAX_SIZE};
