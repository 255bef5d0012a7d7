//! Explicitly constructed sync context
//!
//! Built once at bootstrap and handed to every consumer. Owns the single
//! cache, credential store, router and event bus that the request client and
//! realtime channel share.

use crate::cache::{SqliteStore, SqliteStoreConfig, TieredCache};
use crate::config::{validate_config_result, SyncConfig};
use crate::events::{EventBus, SyncEvent};
use crate::http::{CredentialStore, RequestClient};
use crate::invalidation::InvalidationRouter;
use crate::realtime::{ws_endpoint, ChannelOptions, RealtimeChannel, Transport, WebSocketTransport};
use crate::Result;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Everything business modules may call into
#[derive(Debug)]
pub struct SyncContext {
    config: SyncConfig,
    events: EventBus,
    cache: Arc<TieredCache>,
    credentials: Arc<CredentialStore>,
    router: Arc<InvalidationRouter>,
    client: RequestClient,
    channel: RealtimeChannel,
}

impl SyncContext {
    /// Validate the config, open the persistent tier and wire the components
    pub fn new(config: SyncConfig) -> Result<Self> {
        Self::with_transport(config, Arc::new(WebSocketTransport::new()))
    }

    /// Same as [`SyncContext::new`] with a caller-supplied socket transport
    pub fn with_transport(config: SyncConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        validate_config_result(&config)?;

        let cache = if config.cache.persistent {
            let store = SqliteStore::open(SqliteStoreConfig::new(&config.cache.path))?;
            TieredCache::with_store(config.cache.max_size, store)
        } else {
            TieredCache::in_memory(config.cache.max_size)
        };
        let cache = Arc::new(cache.with_single_flight(config.cache.single_flight));

        Self::assemble(config, cache, transport)
    }

    /// Wire components around an existing cache
    pub fn assemble(
        config: SyncConfig,
        cache: Arc<TieredCache>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        let events = EventBus::default();
        let credentials = Arc::new(CredentialStore::new(events.clone()));
        let router = Arc::new(InvalidationRouter::from_config(&config.invalidation));

        let client = RequestClient::new(
            config.api.base_url.clone(),
            credentials.clone(),
            cache.clone(),
            router.clone(),
        )
        .with_refresh_path(config.api.refresh_path.clone())
        .with_default_ttl(config.api.default_cache_ttl())
        .with_default_timeout(config.api.request_timeout());

        let endpoint = match config.realtime.url {
            Some(ref url) => url.clone(),
            None => ws_endpoint(&config.api.base_url)?,
        };
        let channel = RealtimeChannel::with_transport(
            endpoint,
            ChannelOptions::from(&config.realtime),
            transport,
            cache.clone(),
            router.clone(),
            events.clone(),
        )
        .with_credentials(credentials.clone());

        tracing::debug!(
            base_url = %config.api.base_url,
            endpoint = %channel.endpoint(),
            max_size = cache.max_size(),
            "Sync context ready"
        );

        Ok(Self {
            config,
            events,
            cache,
            credentials,
            router,
            client,
            channel,
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn client(&self) -> &RequestClient {
        &self.client
    }

    pub fn channel(&self) -> &RealtimeChannel {
        &self.channel
    }

    pub fn cache(&self) -> &Arc<TieredCache> {
        &self.cache
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    pub fn router(&self) -> &Arc<InvalidationRouter> {
        &self.router
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Purge every cache entry tagged by `tag`
    pub fn invalidate_by_entity(&self, tag: &str) -> usize {
        self.router.invalidate_by_entity(&self.cache, tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::SetOptions;
    use crate::realtime::MockTransport;
    use std::time::Duration;

    fn memory_config() -> SyncConfig {
        let mut config = SyncConfig::new("https://courts.example.com/api");
        config.cache.persistent = false;
        config
    }

    #[test]
    fn test_context_wiring() {
        let (transport, _server) = MockTransport::new();
        let ctx = SyncContext::with_transport(memory_config(), Arc::new(transport)).unwrap();

        assert_eq!(ctx.client().base_url(), "https://courts.example.com/api");
        assert_eq!(ctx.channel().endpoint(), "wss://courts.example.com/ws");
        assert!(!ctx.credentials().is_authenticated());
    }

    #[test]
    fn test_invalidate_by_entity() {
        let (transport, _server) = MockTransport::new();
        let ctx = SyncContext::with_transport(memory_config(), Arc::new(transport)).unwrap();
        let opts = SetOptions::ttl(Duration::from_secs(60));
        ctx.cache().set("GET:/admin/users", &1, opts).unwrap();
        ctx.cache().set("GET:/courts/2", &2, opts).unwrap();

        assert_eq!(ctx.invalidate_by_entity("user"), 1);
        assert!(ctx.cache().has("GET:/courts/2"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = memory_config();
        config.api.base_url = "courts.example.com".to_string();
        let (transport, _server) = MockTransport::new();
        assert!(SyncContext::with_transport(config, Arc::new(transport)).is_err());
    }

    #[test]
    fn test_persistent_tier_uses_configured_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SyncConfig::new("http://localhost:3000/api");
        config.cache.path = dir.path().join("nested").join("cache.db");

        let (transport, _server) = MockTransport::new();
        let ctx = SyncContext::with_transport(config, Arc::new(transport)).unwrap();
        ctx.cache()
            .set("GET:/venues", &"v", SetOptions::ttl(Duration::from_secs(60)))
            .unwrap();
        assert!(dir.path().join("nested").join("cache.db").exists());
    }
}
