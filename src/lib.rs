//! courtsync - client-side data synchronization layer
//!
//! Keeps cached API data trustworthy without a server-driven consistency
//! protocol. Business modules only call the public operations exposed here;
//! they never touch cache entries or sockets directly.
//!
//! # Architecture
//!
//! - **cache**: two-tier (memory + SQLite) store with TTL, eviction and pattern invalidation
//! - **http**: authenticated request client with single-flight token refresh
//! - **realtime**: auto-reconnecting, heartbeat-sustained socket with typed subscriptions
//! - **invalidation**: entity/event/URL tables mapping changes to cache-key patterns
//! - **context**: the explicitly constructed object wiring the above together
//! - **events**: notifications for the UI layer (session expired, connection lost, ...)

pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod http;
pub mod invalidation;
pub mod logging;
pub mod realtime;

// Re-exports
pub use context::SyncContext;
pub use error::{FieldError, Result, SyncError};
pub use events::{EventBus, SyncEvent};
