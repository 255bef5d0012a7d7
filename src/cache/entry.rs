//! Cache entry and its liveness rule

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Milliseconds since the Unix epoch, the clock every entry is stamped with
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// A cached value together with its insertion time and TTL.
///
/// Serialized as `{ key, data, createdAt, ttl }` (ttl in milliseconds) so the
/// persistent tier stores the same shape the memory tier holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub key: String,
    pub data: serde_json::Value,
    pub created_at: i64,
    pub ttl: u64,
}

impl CacheEntry {
    /// Stamp a new entry with the current time
    pub fn new(key: impl Into<String>, data: serde_json::Value, ttl: Duration) -> Self {
        Self::with_created_at(key, data, ttl, now_millis())
    }

    pub fn with_created_at(
        key: impl Into<String>,
        data: serde_json::Value,
        ttl: Duration,
        created_at: i64,
    ) -> Self {
        Self {
            key: key.into(),
            data,
            created_at,
            ttl: ttl.as_millis().min(u64::MAX as u128) as u64,
        }
    }

    /// An entry is live iff `now - created_at < ttl`
    pub fn is_live_at(&self, now: i64) -> bool {
        let age = now.saturating_sub(self.created_at);
        age < 0 || (age as u64) < self.ttl
    }

    pub fn is_live(&self) -> bool {
        self.is_live_at(now_millis())
    }

    /// Time left before expiry, zero once expired
    pub fn remaining_at(&self, now: i64) -> Duration {
        let expires_at = self.created_at.saturating_add(self.ttl as i64);
        Duration::from_millis(expires_at.saturating_sub(now).max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_liveness_boundary() {
        let entry = CacheEntry::with_created_at("k", json!(1), Duration::from_millis(100), 1_000);

        assert!(entry.is_live_at(1_000));
        assert!(entry.is_live_at(1_099));
        // now - createdAt == ttl is already stale
        assert!(!entry.is_live_at(1_100));
        assert!(!entry.is_live_at(5_000));
    }

    #[test]
    fn test_remaining() {
        let entry = CacheEntry::with_created_at("k", json!(1), Duration::from_secs(1), 0);
        assert_eq!(entry.remaining_at(400), Duration::from_millis(600));
        assert_eq!(entry.remaining_at(2_000), Duration::ZERO);
    }

    #[test]
    fn test_persisted_shape() {
        let entry = CacheEntry::with_created_at(
            "GET:/tournaments",
            json!({"items": []}),
            Duration::from_secs(300),
            42,
        );
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["createdAt"], 42);
        assert_eq!(value["ttl"], 300_000);
        assert_eq!(value["key"], "GET:/tournaments");
    }
}
