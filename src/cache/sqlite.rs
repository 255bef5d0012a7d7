//! SQLite persistent tier

use super::entry::{now_millis, CacheEntry};
use super::store::{PersistentStore, STORAGE_PREFIX};
use crate::Result;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// SQLite store configuration
#[derive(Debug, Clone)]
pub struct SqliteStoreConfig {
    /// Path to SQLite database file
    pub path: PathBuf,

    /// Enable WAL mode for better concurrency
    pub wal_mode: bool,
}

impl SqliteStoreConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            wal_mode: true,
        }
    }
}

/// Row counts reported by [`SqliteStore::entry_counts`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryCounts {
    pub total: usize,
    pub live: usize,
    /// Rows that no longer decode as a cache entry
    pub corrupt: usize,
}

/// Key/value table holding JSON-serialized cache entries
pub struct SqliteStore {
    conn: Mutex<Connection>,
    config: SqliteStoreConfig,
}

impl SqliteStore {
    /// Open or create a cache database
    pub fn open(config: SqliteStoreConfig) -> Result<Self> {
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        tracing::info!(path = %config.path.display(), "Opening persistent cache");

        let conn = Connection::open(&config.path)?;

        if config.wal_mode {
            conn.pragma_update(None, "journal_mode", "WAL")?;
        }

        let store = Self {
            conn: Mutex::new(conn),
            config,
        };
        store.init_schema()?;

        Ok(store)
    }

    /// In-memory database, mostly for tests
    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
            config: SqliteStoreConfig {
                path: PathBuf::from(":memory:"),
                wal_mode: false,
            },
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn().execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS cache_entries (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of persisted rows
    pub fn len(&self) -> Result<usize> {
        let count: i64 =
            self.conn()
                .query_row("SELECT COUNT(*) FROM cache_entries", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Cache rows in the table and how many of them are still live
    pub fn entry_counts(&self) -> Result<EntryCounts> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT value FROM cache_entries WHERE substr(key, 1, ?) = ?")?;
        let rows = stmt.query_map(
            params![STORAGE_PREFIX.len() as i64, STORAGE_PREFIX],
            |row| row.get::<_, String>(0),
        )?;

        let now = now_millis();
        let mut counts = EntryCounts::default();
        for raw in rows {
            counts.total += 1;
            match serde_json::from_str::<CacheEntry>(&raw?) {
                Ok(entry) if entry.is_live_at(now) => counts.live += 1,
                Ok(_) => {}
                Err(_) => counts.corrupt += 1,
            }
        }
        Ok(counts)
    }

    /// Get the database path
    pub fn path(&self) -> &Path {
        &self.config.path
    }
}

impl PersistentStore for SqliteStore {
    fn load(&self, storage_key: &str) -> Result<Option<String>> {
        let value = self
            .conn()
            .query_row(
                "SELECT value FROM cache_entries WHERE key = ?",
                params![storage_key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn store(&self, storage_key: &str, value: &str) -> Result<()> {
        self.conn().execute(
            "INSERT OR REPLACE INTO cache_entries (key, value, updated_at) VALUES (?, ?, ?)",
            params![storage_key, value, now_millis()],
        )?;
        Ok(())
    }

    fn remove(&self, storage_key: &str) -> Result<()> {
        self.conn().execute(
            "DELETE FROM cache_entries WHERE key = ?",
            params![storage_key],
        )?;
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT key FROM cache_entries WHERE substr(key, 1, ?) = ?")?;
        let rows = stmt.query_map(
            params![STORAGE_PREFIX.len() as i64, STORAGE_PREFIX],
            |row| row.get::<_, String>(0),
        )?;

        let mut keys = Vec::new();
        for key in rows {
            keys.push(key?);
        }
        Ok(keys)
    }

    fn clear(&self) -> Result<()> {
        tracing::info!("Clearing persistent cache");
        self.conn().execute(
            "DELETE FROM cache_entries WHERE substr(key, 1, ?) = ?",
            params![STORAGE_PREFIX.len() as i64, STORAGE_PREFIX],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_store_creation() {
        let temp_file = NamedTempFile::new().unwrap();
        let store = SqliteStore::open(SqliteStoreConfig::new(temp_file.path())).unwrap();
        assert!(store.path().exists());
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_store_load_remove() {
        let store = SqliteStore::open_in_memory().unwrap();

        store.store("cache_a", r#"{"x":1}"#).unwrap();
        store.store("cache_a", r#"{"x":2}"#).unwrap();
        assert_eq!(store.load("cache_a").unwrap(), Some(r#"{"x":2}"#.to_string()));
        assert_eq!(store.len().unwrap(), 1);

        store.remove("cache_a").unwrap();
        assert_eq!(store.load("cache_a").unwrap(), None);
    }

    #[test]
    fn test_keys_and_clear_respect_namespace() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.store("cache_one", "1").unwrap();
        store.store("cache_two", "2").unwrap();
        store.store("token", "abc").unwrap();

        let mut keys = store.keys().unwrap();
        keys.sort();
        assert_eq!(keys, vec!["cache_one".to_string(), "cache_two".to_string()]);

        store.clear().unwrap();
        assert!(store.keys().unwrap().is_empty());
        assert_eq!(store.load("token").unwrap(), Some("abc".to_string()));
    }

    #[test]
    fn test_entry_counts() {
        let store = SqliteStore::open_in_memory().unwrap();
        let live = CacheEntry::new(
            "GET:/venues",
            serde_json::json!([]),
            std::time::Duration::from_secs(60),
        );
        let stale = CacheEntry::with_created_at(
            "GET:/courts",
            serde_json::json!([]),
            std::time::Duration::from_millis(10),
            0,
        );
        store.store("cache_GET:/venues", &serde_json::to_string(&live).unwrap()).unwrap();
        store.store("cache_GET:/courts", &serde_json::to_string(&stale).unwrap()).unwrap();
        store.store("cache_bad", "{not json").unwrap();
        store.store("token", "abc").unwrap();

        let counts = store.entry_counts().unwrap();
        assert_eq!(
            counts,
            EntryCounts {
                total: 3,
                live: 1,
                corrupt: 1
            }
        );
    }

    #[test]
    fn test_survives_reopen() {
        let temp_file = NamedTempFile::new().unwrap();
        {
            let store = SqliteStore::open(SqliteStoreConfig::new(temp_file.path())).unwrap();
            store.store("cache_k", "v").unwrap();
        }
        let store = SqliteStore::open(SqliteStoreConfig::new(temp_file.path())).unwrap();
        assert_eq!(store.load("cache_k").unwrap(), Some("v".to_string()));
    }
}
