//! courtsync configuration file handling
//!
//! Loads and manages ~/.config/courtsync/config.yaml.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// HTTP API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL every request path is joined onto
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Token refresh endpoint (POST)
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,

    /// TTL applied to cached GET responses, in seconds
    #[serde(default = "default_cache_ttl_secs")]
    pub default_cache_ttl_secs: u64,

    /// Optional per-request deadline, in seconds
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

fn default_base_url() -> String {
    "http://localhost:3000/api".to_string()
}

fn default_refresh_path() -> String {
    "/auth/refresh".to_string()
}

fn default_cache_ttl_secs() -> u64 {
    300
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            refresh_path: default_refresh_path(),
            default_cache_ttl_secs: default_cache_ttl_secs(),
            request_timeout_secs: None,
        }
    }
}

impl ApiConfig {
    pub fn default_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.default_cache_ttl_secs)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

/// Tiered cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Memory tier capacity; the oldest insertion is evicted beyond it
    #[serde(default = "default_max_size")]
    pub max_size: usize,

    /// Mirror entries into the SQLite tier
    #[serde(default = "default_persistent")]
    pub persistent: bool,

    /// SQLite file backing the persistent tier
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,

    /// Coalesce concurrent misses for the same key into one fetch
    #[serde(default)]
    pub single_flight: bool,
}

fn default_max_size() -> usize {
    100
}

fn default_persistent() -> bool {
    true
}

fn default_cache_path() -> PathBuf {
    // Always use ~/.config for consistency across platforms (macOS, Linux)
    let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(".config");
    path.push("courtsync");
    path.push("cache.db");
    path
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_size: default_max_size(),
            persistent: default_persistent(),
            path: default_cache_path(),
            single_flight: false,
        }
    }
}

/// Realtime channel settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Explicit socket endpoint; derived from `api.base_url` when unset
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default = "default_true")]
    pub auto_reconnect: bool,

    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    /// Base delay before the first reconnect, in milliseconds
    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,

    /// Multiplier applied per additional attempt
    #[serde(default = "default_growth_factor")]
    pub growth_factor: f64,

    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    #[serde(default = "default_open_timeout_ms")]
    pub open_timeout_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

fn default_reconnect_interval_ms() -> u64 {
    1000
}

fn default_growth_factor() -> f64 {
    1.5
}

fn default_heartbeat_interval_ms() -> u64 {
    30_000
}

fn default_open_timeout_ms() -> u64 {
    10_000
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            url: None,
            auto_reconnect: true,
            max_reconnect_attempts: default_max_reconnect_attempts(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
            growth_factor: default_growth_factor(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            open_timeout_ms: default_open_timeout_ms(),
        }
    }
}

impl RealtimeConfig {
    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.open_timeout_ms)
    }
}

/// Extra invalidation rules merged over the built-in tables
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvalidationConfig {
    /// Entity tag -> cache-key substrings
    #[serde(default)]
    pub entities: BTreeMap<String, Vec<String>>,

    /// Realtime event type -> entity tags
    #[serde(default)]
    pub events: BTreeMap<String, Vec<String>>,
}

/// courtsync configuration
///
/// Represents the complete ~/.config/courtsync/config.yaml file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub realtime: RealtimeConfig,

    #[serde(default)]
    pub invalidation: InvalidationConfig,
}

impl SyncConfig {
    /// Create a configuration pointing at the given API base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            api: ApiConfig {
                base_url: base_url.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Load configuration from the default path (~/.config/courtsync/config.yaml)
    pub fn load_default() -> Result<Self> {
        let path = Self::default_path();
        Self::load(&path)
    }

    /// Load configuration from a specific path
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(crate::SyncError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        tracing::info!(path = %path.display(), "Loading courtsync configuration");

        let content = fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;

        tracing::debug!(
            base_url = %config.api.base_url,
            persistent = config.cache.persistent,
            max_size = config.cache.max_size,
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Save configuration to a specific path
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        tracing::info!(path = %path.display(), "Saving courtsync configuration");

        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml)?;

        Ok(())
    }

    /// Get the default config path (~/.config/courtsync/config.yaml)
    pub fn default_path() -> PathBuf {
        let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(".config");
        path.push("courtsync");
        path.push("config.yaml");
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.api.refresh_path, "/auth/refresh");
        assert_eq!(config.api.default_cache_ttl(), Duration::from_secs(300));
        assert_eq!(config.realtime.heartbeat_interval(), Duration::from_secs(30));
        assert_eq!(config.realtime.open_timeout(), Duration::from_secs(10));
        assert!(config.realtime.auto_reconnect);
        assert!(!config.cache.single_flight);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = r#"
api:
  base_url: https://courts.example.com/api
realtime:
  max_reconnect_attempts: 8
invalidation:
  entities:
    league: [league, standings]
"#;
        let config: SyncConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.api.base_url, "https://courts.example.com/api");
        assert_eq!(config.api.default_cache_ttl_secs, 300);
        assert_eq!(config.realtime.max_reconnect_attempts, 8);
        assert_eq!(config.realtime.reconnect_interval_ms, 1000);
        assert_eq!(
            config.invalidation.entities.get("league").unwrap(),
            &vec!["league".to_string(), "standings".to_string()]
        );
    }

    #[test]
    fn test_save_and_load() {
        let temp_file = NamedTempFile::new().unwrap();
        let mut config = SyncConfig::new("https://example.com/api");
        config.cache.max_size = 42;

        config.save(temp_file.path()).unwrap();
        let loaded = SyncConfig::load(temp_file.path()).unwrap();

        assert_eq!(loaded.api.base_url, "https://example.com/api");
        assert_eq!(loaded.cache.max_size, 42);
    }

    #[test]
    fn test_load_missing_file() {
        let result = SyncConfig::load("/nonexistent/courtsync.yaml");
        assert!(matches!(result, Err(crate::SyncError::Config(_))));
    }
}
