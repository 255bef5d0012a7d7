//! Two-level cache: an in-memory tier backed by a persistent store
//!
//! Reads check memory first, then the persistent tier (rehydrating memory on
//! a hit). Expiry is lazy: a stale entry is dropped from both tiers by the
//! read that notices it. Persistent-tier failures are logged and treated as a
//! miss; they never reach the caller.

use super::entry::{now_millis, CacheEntry};
use super::store::{storage_key, PersistentStore, STORAGE_PREFIX};
use crate::{Result, SyncError};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Default memory-tier capacity
pub const DEFAULT_MAX_SIZE: usize = 100;

/// Per-write options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetOptions {
    pub ttl: Duration,
    /// Memory-tier capacity for this write; the cache default when `None`
    pub max_size: Option<usize>,
}

impl SetOptions {
    pub fn ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            max_size: None,
        }
    }

    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = Some(max_size);
        self
    }
}

/// Counters for cache behavior
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Entries rehydrated from the persistent tier
    pub rehydrations: u64,
    /// Capacity evictions
    pub evictions: u64,
    /// Entries dropped because their TTL elapsed
    pub expirations: u64,
    /// Entries removed by pattern invalidation
    pub invalidations: u64,
    /// Persistent-tier reads or writes that failed and were swallowed
    pub storage_errors: u64,
    /// Current memory-tier size
    pub entries: usize,
}

impl CacheStats {
    /// Hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

#[derive(Debug, Default)]
struct MemoryTier {
    entries: HashMap<String, CacheEntry>,
    /// Insertion order, oldest first
    order: VecDeque<String>,
    stats: CacheStats,
}

impl MemoryTier {
    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
        Some(entry)
    }

    /// Insert an entry, returning the key evicted to make room (if any).
    /// Overwriting a key counts as a fresh insertion.
    fn insert(&mut self, entry: CacheEntry, max_size: usize) -> Option<String> {
        let key = entry.key.clone();
        let mut evicted = None;

        if self.remove(&key).is_none() && self.entries.len() >= max_size.max(1) {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
                self.stats.evictions += 1;
                evicted = Some(oldest);
            }
        }

        self.order.push_back(key.clone());
        self.entries.insert(key, entry);
        evicted
    }
}

/// Tiered key/value cache with per-entry TTL and insertion-order eviction
pub struct TieredCache {
    memory: Mutex<MemoryTier>,
    persistent: Option<Box<dyn PersistentStore>>,
    max_size: usize,
    /// Keyed locks for single-flight fetches, when enabled
    inflight: Option<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl TieredCache {
    /// Memory-only cache
    pub fn in_memory(max_size: usize) -> Self {
        Self {
            memory: Mutex::new(MemoryTier::default()),
            persistent: None,
            max_size,
            inflight: None,
        }
    }

    /// Cache mirrored into a persistent store
    pub fn with_store(max_size: usize, store: impl PersistentStore + 'static) -> Self {
        Self {
            persistent: Some(Box::new(store)),
            ..Self::in_memory(max_size)
        }
    }

    /// Coalesce concurrent misses for the same key into a single fetch
    pub fn with_single_flight(mut self, enabled: bool) -> Self {
        self.inflight = enabled.then(|| Mutex::new(HashMap::new()));
        self
    }

    fn memory(&self) -> MutexGuard<'_, MemoryTier> {
        self.memory.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record_storage_error(&self, op: &str, key: &str, error: &SyncError) {
        tracing::warn!(op, key, error = %error, "Persistent cache tier failed, ignoring");
        self.memory().stats.storage_errors += 1;
    }

    fn persist_remove(&self, key: &str) {
        if let Some(store) = &self.persistent {
            if let Err(e) = store.remove(&storage_key(key)) {
                self.record_storage_error("remove", key, &e);
            }
        }
    }

    fn persist_store(&self, entry: &CacheEntry) {
        let Some(store) = &self.persistent else {
            return;
        };
        let result = serde_json::to_string(entry)
            .map_err(SyncError::from)
            .and_then(|raw| store.store(&storage_key(&entry.key), &raw));
        if let Err(e) = result {
            self.record_storage_error("store", &entry.key, &e);
        }
    }

    /// Read the persistent tier. Corrupt rows are dropped and read as a miss.
    fn load_persisted(&self, key: &str) -> Option<CacheEntry> {
        let store = self.persistent.as_ref()?;
        let raw = match store.load(&storage_key(key)) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                self.record_storage_error("load", key, &e);
                return None;
            }
        };

        match serde_json::from_str::<CacheEntry>(&raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                let error = SyncError::Serialization(e.to_string());
                self.record_storage_error("decode", key, &error);
                self.persist_remove(key);
                None
            }
        }
    }

    /// Raw JSON value for a live key
    pub fn get_value(&self, key: &str) -> Option<serde_json::Value> {
        let now = now_millis();

        {
            let mut memory = self.memory();
            let live = memory.entries.get(key).map(|e| e.is_live_at(now));
            match live {
                Some(true) => {
                    memory.stats.hits += 1;
                    tracing::trace!(key, "Cache hit (memory)");
                    return memory.entries.get(key).map(|e| e.data.clone());
                }
                Some(false) => {
                    memory.remove(key);
                    memory.stats.expirations += 1;
                    memory.stats.misses += 1;
                    drop(memory);
                    tracing::debug!(key, "Cache entry expired");
                    self.persist_remove(key);
                    return None;
                }
                None => {}
            }
        }

        match self.load_persisted(key) {
            Some(entry) if entry.is_live_at(now) => {
                tracing::debug!(key, "Cache hit (persistent), rehydrating memory");
                let data = entry.data.clone();
                let evicted = {
                    let mut memory = self.memory();
                    memory.stats.hits += 1;
                    memory.stats.rehydrations += 1;
                    memory.insert(entry, self.max_size)
                };
                if let Some(evicted) = evicted {
                    self.persist_remove(&evicted);
                }
                Some(data)
            }
            Some(_) => {
                tracing::debug!(key, "Persisted cache entry expired");
                self.persist_remove(key);
                let mut memory = self.memory();
                memory.stats.expirations += 1;
                memory.stats.misses += 1;
                None
            }
            None => {
                self.memory().stats.misses += 1;
                tracing::trace!(key, "Cache miss");
                None
            }
        }
    }

    /// Typed read of a live key. A value that no longer fits `T` reads as a miss.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get_value(key)?;
        match serde_json::from_value(value) {
            Ok(data) => Some(data),
            Err(e) => {
                tracing::warn!(key, error = %e, "Cached value has unexpected shape");
                None
            }
        }
    }

    /// Insert or overwrite a key in both tiers.
    ///
    /// When the memory tier is full, the single oldest insertion is evicted
    /// from both tiers first.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, data: &T, options: SetOptions) -> Result<()> {
        if options.ttl.as_millis() == 0 {
            return Err(SyncError::Other(format!(
                "TTL for cache key '{}' must be at least one millisecond",
                key
            )));
        }

        let entry = CacheEntry::new(key, serde_json::to_value(data)?, options.ttl);
        let max_size = options.max_size.unwrap_or(self.max_size);

        let evicted = self.memory().insert(entry.clone(), max_size);
        if let Some(evicted) = evicted {
            tracing::debug!(evicted = %evicted, key, "Evicted oldest cache entry");
            self.persist_remove(&evicted);
        }
        self.persist_store(&entry);

        Ok(())
    }

    /// Remove a key from both tiers
    pub fn delete(&self, key: &str) -> bool {
        let removed = self.memory().remove(key).is_some();
        self.persist_remove(key);
        removed
    }

    /// Whether a live value exists for `key`
    pub fn has(&self, key: &str) -> bool {
        self.get_value(key).is_some()
    }

    /// Wipe both tiers
    pub fn clear(&self) {
        {
            let mut memory = self.memory();
            memory.entries.clear();
            memory.order.clear();
        }
        if let Some(store) = &self.persistent {
            if let Err(e) = store.clear() {
                self.record_storage_error("clear", "*", &e);
            }
        }
        tracing::info!("Cache cleared");
    }

    /// Delete every key containing `pattern` as a substring, from both tiers
    pub fn invalidate(&self, pattern: &str) -> usize {
        self.invalidate_where(|key| key.contains(pattern), pattern)
    }

    /// Delete every key matching `pattern`, from both tiers
    pub fn invalidate_regex(&self, pattern: &Regex) -> usize {
        self.invalidate_where(|key| pattern.is_match(key), pattern.as_str())
    }

    fn invalidate_where(&self, matches: impl Fn(&str) -> bool, label: &str) -> usize {
        let mut doomed: Vec<String> = {
            let memory = self.memory();
            memory
                .order
                .iter()
                .filter(|k| matches(k))
                .cloned()
                .collect()
        };

        if let Some(store) = &self.persistent {
            match store.keys() {
                Ok(keys) => {
                    for stored in keys {
                        let Some(key) = stored.strip_prefix(STORAGE_PREFIX) else {
                            continue;
                        };
                        if matches(key) && !doomed.iter().any(|d| d == key) {
                            doomed.push(key.to_string());
                        }
                    }
                }
                Err(e) => self.record_storage_error("keys", label, &e),
            }
        }

        {
            let mut memory = self.memory();
            for key in &doomed {
                memory.remove(key);
            }
            memory.stats.invalidations += doomed.len() as u64;
        }
        for key in &doomed {
            self.persist_remove(key);
        }

        if !doomed.is_empty() {
            tracing::debug!(pattern = label, removed = doomed.len(), "Invalidated cache entries");
        }
        doomed.len()
    }

    /// Return a live cached value, or run `fetcher` and cache its `Ok` result.
    ///
    /// Errors are never cached, so the next call runs the fetcher again.
    /// Without single-flight, concurrent misses for one key each run the fetcher.
    pub async fn cached_fetch<T, E, F, Fut>(
        &self,
        key: &str,
        options: SetOptions,
        fetcher: F,
    ) -> std::result::Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        if let Some(cached) = self.get::<T>(key) {
            return Ok(cached);
        }

        let flight = self.flight_lock(key);
        let _guard = match &flight {
            Some(lock) => Some(lock.clone().lock_owned().await),
            None => None,
        };

        // A coalesced waiter re-reads what the leader stored
        if flight.is_some() {
            if let Some(cached) = self.get::<T>(key) {
                drop(_guard);
                self.release_flight(key, flight);
                return Ok(cached);
            }
        }

        let result = fetcher().await;
        if let Ok(ref data) = result {
            if let Err(e) = self.set(key, data, options) {
                tracing::warn!(key, error = %e, "Failed to cache fetched value");
            }
        }

        drop(_guard);
        self.release_flight(key, flight);
        result
    }

    fn flight_lock(&self, key: &str) -> Option<Arc<tokio::sync::Mutex<()>>> {
        let inflight = self.inflight.as_ref()?;
        let mut map = inflight.lock().unwrap_or_else(|e| e.into_inner());
        Some(map.entry(key.to_string()).or_default().clone())
    }

    fn release_flight(&self, key: &str, lock: Option<Arc<tokio::sync::Mutex<()>>>) {
        let (Some(inflight), Some(lock)) = (self.inflight.as_ref(), lock) else {
            return;
        };
        let mut map = inflight.lock().unwrap_or_else(|e| e.into_inner());
        // Only the map and this caller still hold the lock
        if Arc::strong_count(&lock) <= 2 {
            map.remove(key);
        }
    }

    /// Number of entries in the memory tier
    pub fn len(&self) -> usize {
        self.memory().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Memory-tier keys, oldest insertion first
    pub fn keys(&self) -> Vec<String> {
        self.memory().order.iter().cloned().collect()
    }

    pub fn stats(&self) -> CacheStats {
        let memory = self.memory();
        CacheStats {
            entries: memory.entries.len(),
            ..memory.stats.clone()
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }
}

impl std::fmt::Debug for TieredCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredCache")
            .field("max_size", &self.max_size)
            .field("persistent", &self.persistent.is_some())
            .field("single_flight", &self.inflight.is_some())
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::MemoryStore;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ttl(secs: u64) -> SetOptions {
        SetOptions::ttl(Duration::from_secs(secs))
    }

    /// Store whose every call fails, like a full or unavailable disk
    struct BrokenStore;

    impl PersistentStore for BrokenStore {
        fn load(&self, _: &str) -> Result<Option<String>> {
            Err(SyncError::Storage("unavailable".into()))
        }
        fn store(&self, _: &str, _: &str) -> Result<()> {
            Err(SyncError::Storage("quota exceeded".into()))
        }
        fn remove(&self, _: &str) -> Result<()> {
            Err(SyncError::Storage("unavailable".into()))
        }
        fn keys(&self) -> Result<Vec<String>> {
            Err(SyncError::Storage("unavailable".into()))
        }
        fn clear(&self) -> Result<()> {
            Err(SyncError::Storage("unavailable".into()))
        }
    }

    #[test]
    fn test_set_then_get() {
        let cache = TieredCache::in_memory(10);
        cache.set("user:1", &json!({"name": "Ada"}), ttl(60)).unwrap();

        let value: serde_json::Value = cache.get("user:1").unwrap();
        assert_eq!(value, json!({"name": "Ada"}));
        assert!(cache.has("user:1"));
        assert_eq!(cache.stats().hits, 2);
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let cache = TieredCache::in_memory(10);
        assert!(cache.set("k", &1, SetOptions::ttl(Duration::ZERO)).is_err());
        assert!(!cache.has("k"));
    }

    #[test]
    fn test_sub_millisecond_ttl_rejected() {
        let cache = TieredCache::in_memory(10);
        let opts = SetOptions::ttl(Duration::from_micros(500));
        assert!(cache.set("k", &1, opts).is_err());
        assert!(cache.is_empty());

        cache.set("k", &1, SetOptions::ttl(Duration::from_millis(1))).unwrap();
    }

    #[test]
    fn test_lazy_expiry_removes_from_both_tiers() {
        let store = Arc::new(MemoryStore::new());
        let cache = TieredCache::with_store(10, SharedStore(store.clone()));
        cache
            .set("k", &"v", SetOptions::ttl(Duration::from_millis(20)))
            .unwrap();
        assert!(store.load("cache_k").unwrap().is_some());

        std::thread::sleep(Duration::from_millis(40));

        assert_eq!(cache.get::<String>("k"), None);
        assert!(store.load("cache_k").unwrap().is_none());
        assert_eq!(cache.stats().expirations, 1);
    }

    #[test]
    fn test_oldest_insertion_evicted() {
        let cache = TieredCache::in_memory(2);
        cache.set("A", &1, ttl(60)).unwrap();
        cache.set("B", &2, ttl(60)).unwrap();
        // reading A does not protect it: eviction is by insertion, not access
        assert_eq!(cache.get::<i32>("A"), Some(1));
        cache.set("C", &3, ttl(60)).unwrap();

        assert_eq!(cache.get::<i32>("A"), None);
        assert_eq!(cache.get::<i32>("B"), Some(2));
        assert_eq!(cache.get::<i32>("C"), Some(3));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_per_write_max_size() {
        let cache = TieredCache::in_memory(100);
        for i in 0..5 {
            cache
                .set(&format!("k{}", i), &i, ttl(60).with_max_size(3))
                .unwrap();
        }
        assert_eq!(cache.keys(), vec!["k2", "k3", "k4"]);
    }

    #[test]
    fn test_overwrite_does_not_evict() {
        let cache = TieredCache::in_memory(2);
        cache.set("A", &1, ttl(60)).unwrap();
        cache.set("B", &2, ttl(60)).unwrap();
        cache.set("A", &10, ttl(60)).unwrap();

        assert_eq!(cache.get::<i32>("A"), Some(10));
        assert_eq!(cache.get::<i32>("B"), Some(2));
        assert_eq!(cache.keys(), vec!["B", "A"]);
    }

    #[test]
    fn test_rehydrate_from_persistent_tier() {
        let store = Arc::new(MemoryStore::new());
        let first = TieredCache::with_store(10, SharedStore(store.clone()));
        first.set("GET:/venues", &json!(["Court 1"]), ttl(60)).unwrap();

        let second = TieredCache::with_store(10, SharedStore(store));
        assert!(second.is_empty());
        assert_eq!(
            second.get::<Vec<String>>("GET:/venues"),
            Some(vec!["Court 1".to_string()])
        );
        assert_eq!(second.len(), 1);
        assert_eq!(second.stats().rehydrations, 1);
    }

    #[test]
    fn test_corrupt_persisted_entry_is_a_miss() {
        let store = Arc::new(MemoryStore::new());
        store.store("cache_bad", "{not json").unwrap();
        let cache = TieredCache::with_store(10, SharedStore(store.clone()));

        assert_eq!(cache.get::<String>("bad"), None);
        assert!(store.load("cache_bad").unwrap().is_none());
        assert_eq!(cache.stats().storage_errors, 1);
    }

    #[test]
    fn test_broken_store_never_surfaces() {
        let cache = TieredCache::with_store(10, BrokenStore);
        cache.set("k", &1, ttl(60)).unwrap();
        assert_eq!(cache.get::<i32>("k"), Some(1));
        assert_eq!(cache.get::<i32>("missing"), None);
        assert_eq!(cache.invalidate("k"), 1);
        cache.clear();
        assert!(cache.stats().storage_errors > 0);
    }

    #[test]
    fn test_invalidate_substring() {
        let store = Arc::new(MemoryStore::new());
        let cache = TieredCache::with_store(10, SharedStore(store.clone()));
        cache.set("GET:/tournaments", &1, ttl(60)).unwrap();
        cache.set("GET:/tournaments/5", &2, ttl(60)).unwrap();
        cache.set("GET:/users/me", &3, ttl(60)).unwrap();
        // only in the persistent tier
        store
            .store(
                "cache_GET:/tournaments/9",
                &serde_json::to_string(&CacheEntry::new("GET:/tournaments/9", json!(4), Duration::from_secs(60)))
                    .unwrap(),
            )
            .unwrap();

        assert_eq!(cache.invalidate("tournament"), 3);
        assert!(!cache.has("GET:/tournaments"));
        assert!(!cache.has("GET:/tournaments/9"));
        assert_eq!(cache.get::<i32>("GET:/users/me"), Some(3));
    }

    #[test]
    fn test_invalidate_regex() {
        let cache = TieredCache::in_memory(10);
        cache.set("GET:/bookings/1", &1, ttl(60)).unwrap();
        cache.set("GET:/bookings/22", &2, ttl(60)).unwrap();
        cache.set("GET:/bookings", &3, ttl(60)).unwrap();

        let pattern = Regex::new(r"^GET:/bookings/\d+$").unwrap();
        assert_eq!(cache.invalidate_regex(&pattern), 2);
        assert_eq!(cache.keys(), vec!["GET:/bookings"]);
    }

    #[test]
    fn test_delete_and_clear() {
        let cache = TieredCache::in_memory(10);
        cache.set("a", &1, ttl(60)).unwrap();
        cache.set("b", &2, ttl(60)).unwrap();

        assert!(cache.delete("a"));
        assert!(!cache.delete("a"));
        assert!(!cache.has("a"));

        cache.clear();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_cached_fetch_caches_success() {
        let cache = TieredCache::in_memory(10);
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value: std::result::Result<i32, String> = cache
                .cached_fetch("k", ttl(60), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(7)
                })
                .await;
            assert_eq!(value, Ok(7));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cached_fetch_never_caches_failure() {
        let cache = TieredCache::in_memory(10);
        let calls = AtomicUsize::new(0);

        let first: std::result::Result<i32, String> = cache
            .cached_fetch("k", ttl(60), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("boom".to_string())
            })
            .await;
        assert!(first.is_err());
        assert!(!cache.has("k"));

        let second: std::result::Result<i32, String> = cache
            .cached_fetch("k", ttl(60), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(1)
            })
            .await;
        assert_eq!(second, Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_misses_without_single_flight() {
        let cache = Arc::new(TieredCache::in_memory(10));
        let calls = Arc::new(AtomicUsize::new(0));

        let fetch = |cache: Arc<TieredCache>, calls: Arc<AtomicUsize>| async move {
            cache
                .cached_fetch::<i32, String, _, _>("k", ttl(60), || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(30)).await;
                    Ok(1)
                })
                .await
        };

        let (a, b) = tokio::join!(
            fetch(cache.clone(), calls.clone()),
            fetch(cache.clone(), calls.clone())
        );
        assert_eq!((a, b), (Ok(1), Ok(1)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_misses_with_single_flight() {
        let cache = Arc::new(TieredCache::in_memory(10).with_single_flight(true));
        let calls = Arc::new(AtomicUsize::new(0));

        let fetch = |cache: Arc<TieredCache>, calls: Arc<AtomicUsize>| async move {
            cache
                .cached_fetch::<i32, String, _, _>("k", ttl(60), || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(30)).await;
                    Ok(1)
                })
                .await
        };

        let (a, b) = tokio::join!(
            fetch(cache.clone(), calls.clone()),
            fetch(cache.clone(), calls.clone())
        );
        assert_eq!((a, b), (Ok(1), Ok(1)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    /// Lets two caches in one test share a store
    struct SharedStore(Arc<MemoryStore>);

    impl PersistentStore for SharedStore {
        fn load(&self, k: &str) -> Result<Option<String>> {
            self.0.load(k)
        }
        fn store(&self, k: &str, v: &str) -> Result<()> {
            self.0.store(k, v)
        }
        fn remove(&self, k: &str) -> Result<()> {
            self.0.remove(k)
        }
        fn keys(&self) -> Result<Vec<String>> {
            self.0.keys()
        }
        fn clear(&self) -> Result<()> {
            self.0.clear()
        }
    }
}
