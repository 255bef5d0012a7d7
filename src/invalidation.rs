//! Invalidation routing
//!
//! Declarative tables mapping "something changed" signals to the cache-key
//! substrings that must be purged:
//! - entity tag -> patterns (`user -> user, admin, dashboard`)
//! - realtime event type -> entity tags (`payment_status -> payment`)
//! - mutated URL -> every entity tag the URL mentions
//!
//! Unknown tags, events and URLs resolve to nothing; that is a no-op, not an error.

use crate::cache::TieredCache;
use crate::config::InvalidationConfig;
use std::collections::BTreeMap;

const DEFAULT_ENTITIES: &[(&str, &[&str])] = &[
    ("tournament", &["tournament", "search", "dashboard"]),
    ("match", &["match", "tournament", "dashboard"]),
    ("team", &["team", "tournament"]),
    ("booking", &["booking", "availability", "dashboard"]),
    ("court", &["court", "availability", "search"]),
    ("venue", &["venue", "court", "search"]),
    ("payment", &["payment", "booking", "dashboard"]),
    ("user", &["user", "admin", "dashboard"]),
    ("review", &["review", "venue", "admin"]),
    ("notification", &["notification"]),
    ("microsite", &["microsite"]),
];

const DEFAULT_EVENTS: &[(&str, &[&str])] = &[
    ("tournament_update", &["tournament"]),
    ("tournament_created", &["tournament"]),
    ("match_update", &["match"]),
    ("team_update", &["team"]),
    ("booking_update", &["booking"]),
    ("booking_created", &["booking"]),
    ("booking_cancelled", &["booking"]),
    ("availability_update", &["court"]),
    ("payment_status", &["payment"]),
    ("user_update", &["user"]),
    ("review_moderated", &["review"]),
    ("notification", &["notification"]),
];

/// Resolves change signals to cache-key patterns
#[derive(Debug, Clone)]
pub struct InvalidationRouter {
    entities: BTreeMap<String, Vec<String>>,
    events: BTreeMap<String, Vec<String>>,
}

fn owned_table(table: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
    table
        .iter()
        .map(|(k, v)| (k.to_string(), v.iter().map(|s| s.to_string()).collect()))
        .collect()
}

fn push_unique(out: &mut Vec<String>, items: &[String]) {
    for item in items {
        if !out.contains(item) {
            out.push(item.clone());
        }
    }
}

impl InvalidationRouter {
    /// Router with the built-in tables
    pub fn new() -> Self {
        Self {
            entities: owned_table(DEFAULT_ENTITIES),
            events: owned_table(DEFAULT_EVENTS),
        }
    }

    /// Router with no rules at all
    pub fn empty() -> Self {
        Self {
            entities: BTreeMap::new(),
            events: BTreeMap::new(),
        }
    }

    /// Built-in tables with configured rules layered on top
    pub fn from_config(config: &InvalidationConfig) -> Self {
        let mut router = Self::new();
        for (tag, patterns) in &config.entities {
            router.entities.insert(tag.clone(), patterns.clone());
        }
        for (event, tags) in &config.events {
            router.events.insert(event.clone(), tags.clone());
        }
        router
    }

    pub fn with_entity(mut self, tag: impl Into<String>, patterns: &[&str]) -> Self {
        self.entities.insert(
            tag.into(),
            patterns.iter().map(|p| p.to_string()).collect(),
        );
        self
    }

    pub fn with_event(mut self, event_type: impl Into<String>, tags: &[&str]) -> Self {
        self.events
            .insert(event_type.into(), tags.iter().map(|t| t.to_string()).collect());
        self
    }

    pub fn patterns_for_entity(&self, tag: &str) -> Vec<String> {
        self.entities.get(tag).cloned().unwrap_or_default()
    }

    pub fn patterns_for_event(&self, event_type: &str) -> Vec<String> {
        let mut patterns = Vec::new();
        for tag in self.events.get(event_type).into_iter().flatten() {
            push_unique(&mut patterns, &self.patterns_for_entity(tag));
        }
        patterns
    }

    /// Patterns for every entity tag that appears in the URL
    pub fn patterns_for_url(&self, url: &str) -> Vec<String> {
        let url = url.to_ascii_lowercase();
        let mut patterns = Vec::new();
        for (tag, tag_patterns) in &self.entities {
            if url.contains(tag.as_str()) {
                push_unique(&mut patterns, tag_patterns);
            }
        }
        patterns
    }

    fn purge(&self, cache: &TieredCache, signal: &str, patterns: &[String]) -> usize {
        if patterns.is_empty() {
            tracing::trace!(signal, "No invalidation rule matched");
            return 0;
        }
        let removed: usize = patterns.iter().map(|p| cache.invalidate(p)).sum();
        tracing::debug!(signal, ?patterns, removed, "Cache invalidated");
        removed
    }

    pub fn invalidate_by_entity(&self, cache: &TieredCache, tag: &str) -> usize {
        self.purge(cache, tag, &self.patterns_for_entity(tag))
    }

    pub fn route_by_url(&self, cache: &TieredCache, url: &str) -> usize {
        self.purge(cache, url, &self.patterns_for_url(url))
    }

    pub fn route_event(&self, cache: &TieredCache, event_type: &str) -> usize {
        self.purge(cache, event_type, &self.patterns_for_event(event_type))
    }
}

impl Default for InvalidationRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::SetOptions;
    use std::time::Duration;

    fn seeded_cache() -> TieredCache {
        let cache = TieredCache::in_memory(50);
        let opts = SetOptions::ttl(Duration::from_secs(60));
        for key in [
            "GET:/tournaments",
            "GET:/search#abc",
            "GET:/dashboard/summary",
            "GET:/users/me",
            "GET:/admin/users",
            "GET:/payments/7",
            "GET:/venues/3",
        ] {
            cache.set(key, &1, opts).unwrap();
        }
        cache
    }

    #[test]
    fn test_entity_lookup() {
        let router = InvalidationRouter::new();
        assert_eq!(
            router.patterns_for_entity("user"),
            vec!["user", "admin", "dashboard"]
        );
        assert!(router.patterns_for_entity("unknown").is_empty());
    }

    #[test]
    fn test_event_lookup_goes_through_entity_table() {
        let router = InvalidationRouter::new();
        assert_eq!(
            router.patterns_for_event("payment_status"),
            vec!["payment", "booking", "dashboard"]
        );
        assert!(router.patterns_for_event("chat_typing").is_empty());
    }

    #[test]
    fn test_url_routing() {
        let router = InvalidationRouter::new();
        let patterns = router.patterns_for_url("/tournaments/5/matches");
        for expected in ["tournament", "search", "dashboard", "match"] {
            assert!(patterns.contains(&expected.to_string()), "{}", expected);
        }
        assert!(router.patterns_for_url("/health").is_empty());
    }

    #[test]
    fn test_route_by_url_purges_cache() {
        let cache = seeded_cache();
        let router = InvalidationRouter::new();

        let removed = router.route_by_url(&cache, "/tournaments/5");
        assert_eq!(removed, 3);
        assert!(!cache.has("GET:/tournaments"));
        assert!(!cache.has("GET:/search#abc"));
        assert!(!cache.has("GET:/dashboard/summary"));
        assert!(cache.has("GET:/users/me"));
    }

    #[test]
    fn test_unknown_signal_is_noop() {
        let cache = seeded_cache();
        let router = InvalidationRouter::new();
        assert_eq!(router.route_event(&cache, "typing_indicator"), 0);
        assert_eq!(router.invalidate_by_entity(&cache, "spaceship"), 0);
        assert_eq!(cache.len(), 7);
    }

    #[test]
    fn test_config_overrides() {
        let mut config = InvalidationConfig::default();
        config
            .entities
            .insert("user".to_string(), vec!["user".to_string()]);
        config
            .events
            .insert("profile_changed".to_string(), vec!["user".to_string()]);

        let router = InvalidationRouter::from_config(&config);
        assert_eq!(router.patterns_for_entity("user"), vec!["user"]);
        assert_eq!(router.patterns_for_event("profile_changed"), vec!["user"]);
        // untouched defaults survive
        assert_eq!(router.patterns_for_entity("tournament").len(), 3);
    }

    #[test]
    fn test_builder_rules() {
        let router = InvalidationRouter::empty()
            .with_entity("league", &["league", "standings"])
            .with_event("league_update", &["league"]);
        assert_eq!(
            router.patterns_for_event("league_update"),
            vec!["league", "standings"]
        );
    }
}
