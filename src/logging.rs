//! Logging configuration using tracing
//!
//! Structured logging to stderr with support for the RUST_LOG environment variable.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the tracing subscriber
///
/// Filtering follows `RUST_LOG` and defaults to `warn`, so a host application
/// embedding the sync layer stays quiet unless asked otherwise.
///
/// # Example RUST_LOG values
/// - `RUST_LOG=courtsync=debug` - cache hits/misses, refresh and reconnect traces
/// - `RUST_LOG=courtsync::realtime=trace` - every inbound frame
///
/// # Errors
/// Returns an error if a global subscriber has already been installed
pub fn init() -> crate::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_line_number(true),
        )
        .try_init()
        .map_err(|e| crate::SyncError::Other(format!("Failed to initialize tracing: {}", e)))?;

    Ok(())
}

/// Initialize logging for tests (no-op if already initialized)
pub fn init_test() {
    let _ = init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_test_helper() {
        init_test();
        init_test();
    }

    #[test]
    fn test_structured_fields() {
        init_test();
        tracing::debug!(key = "GET:/tournaments", "cache miss");
        tracing::info!(attempt = 2, delay_ms = 1500, "scheduling reconnect");
    }
}
