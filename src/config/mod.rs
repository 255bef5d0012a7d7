//! Configuration system
//!
//! Loads ~/.config/courtsync/config.yaml with support for:
//! - API base URL, refresh endpoint and request deadlines
//! - Cache capacity and the SQLite-backed persistent tier
//! - Realtime reconnect/heartbeat tuning
//! - Extra invalidation rules on top of the built-in tables

mod sync_config;
pub mod validation;

pub use sync_config::{ApiConfig, CacheSettings, InvalidationConfig, RealtimeConfig, SyncConfig};
pub use validation::{validate_config, validate_config_result, ValidationError};
