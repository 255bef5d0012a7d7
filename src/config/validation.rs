//! Configuration validation
//!
//! Validates courtsync configuration for correctness:
//! - Base URL is an http(s) URL
//! - Realtime URL (when given) is a ws(s) URL
//! - Capacities, intervals and backoff growth are positive

use super::sync_config::SyncConfig;
use crate::SyncError;

/// Validation error details
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validation result
pub type ValidationResult = std::result::Result<(), Vec<ValidationError>>;

/// Validate a courtsync configuration, collecting every problem
pub fn validate_config(config: &SyncConfig) -> ValidationResult {
    let mut errors = Vec::new();

    let base = config.api.base_url.as_str();
    if !(base.starts_with("http://") || base.starts_with("https://")) {
        errors.push(ValidationError::new(
            "api.base_url",
            format!("Must start with http:// or https://, got '{}'", base),
        ));
    }

    if !config.api.refresh_path.starts_with('/') {
        errors.push(ValidationError::new(
            "api.refresh_path",
            "Must be an absolute path starting with '/'",
        ));
    }

    if config.api.default_cache_ttl_secs == 0 {
        errors.push(ValidationError::new(
            "api.default_cache_ttl_secs",
            "TTL must be greater than 0",
        ));
    }

    if config.api.request_timeout_secs == Some(0) {
        errors.push(ValidationError::new(
            "api.request_timeout_secs",
            "Timeout must be greater than 0 when set",
        ));
    }

    if config.cache.max_size == 0 {
        errors.push(ValidationError::new(
            "cache.max_size",
            "Capacity must be greater than 0",
        ));
    }

    if let Some(ref url) = config.realtime.url {
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            errors.push(ValidationError::new(
                "realtime.url",
                format!("Must start with ws:// or wss://, got '{}'", url),
            ));
        }
    }

    if config.realtime.growth_factor < 1.0 {
        errors.push(ValidationError::new(
            "realtime.growth_factor",
            "Backoff growth factor must be at least 1.0",
        ));
    }

    if config.realtime.heartbeat_interval_ms == 0 {
        errors.push(ValidationError::new(
            "realtime.heartbeat_interval_ms",
            "Heartbeat interval must be greater than 0",
        ));
    }

    if config.realtime.open_timeout_ms == 0 {
        errors.push(ValidationError::new(
            "realtime.open_timeout_ms",
            "Open timeout must be greater than 0",
        ));
    }

    for (entity, patterns) in &config.invalidation.entities {
        if patterns.iter().any(|p| p.is_empty()) {
            errors.push(ValidationError::new(
                format!("invalidation.entities.{}", entity),
                "Empty pattern would purge every cache entry",
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate and convert to a crate error carrying every message
pub fn validate_config_result(config: &SyncConfig) -> crate::Result<()> {
    validate_config(config).map_err(|errors| {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        SyncError::Config(messages.join("; "))
    })
}
