//! Persistent tier abstraction

use crate::Result;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Namespace prefix for every key written to a persistent store
pub const STORAGE_PREFIX: &str = "cache_";

/// Storage key for a cache key
pub fn storage_key(key: &str) -> String {
    format!("{}{}", STORAGE_PREFIX, key)
}

/// Backing store for the persistent tier.
///
/// Values are JSON-serialized cache entries. Implementations report their own
/// failures; the tiered cache decides to swallow them.
pub trait PersistentStore: Send + Sync {
    fn load(&self, storage_key: &str) -> Result<Option<String>>;

    fn store(&self, storage_key: &str, value: &str) -> Result<()>;

    fn remove(&self, storage_key: &str) -> Result<()>;

    /// Every key carrying the `cache_` prefix
    fn keys(&self) -> Result<Vec<String>>;

    /// Remove every key carrying the `cache_` prefix
    fn clear(&self) -> Result<()>;
}

/// Process-local store, used when persistence is disabled and in tests
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn values(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        self.values.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl PersistentStore for MemoryStore {
    fn load(&self, storage_key: &str) -> Result<Option<String>> {
        Ok(self.values().get(storage_key).cloned())
    }

    fn store(&self, storage_key: &str, value: &str) -> Result<()> {
        self.values()
            .insert(storage_key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, storage_key: &str) -> Result<()> {
        self.values().remove(storage_key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self
            .values()
            .keys()
            .filter(|k| k.starts_with(STORAGE_PREFIX))
            .cloned()
            .collect())
    }

    fn clear(&self) -> Result<()> {
        self.values().retain(|k, _| !k.starts_with(STORAGE_PREFIX));
        Ok(())
    }
}
