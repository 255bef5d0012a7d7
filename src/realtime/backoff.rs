//! Reconnect delay schedule

use crate::config::RealtimeConfig;
use std::time::Duration;

/// Exponential backoff: `base * growth^(attempt - 1)`.
///
/// No jitter, so delays never decrease from one attempt to the next.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    pub base: Duration,
    pub growth_factor: f64,
    /// Upper bound for a single delay
    pub max_delay: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            growth_factor: 1.5,
            max_delay: Duration::from_secs(300),
        }
    }
}

impl Backoff {
    pub fn new(base: Duration, growth_factor: f64) -> Self {
        Self {
            base,
            growth_factor: growth_factor.max(1.0),
            ..Self::default()
        }
    }

    pub fn from_config(config: &RealtimeConfig) -> Self {
        Self::new(config.reconnect_interval(), config.growth_factor)
    }

    /// Delay before reconnect `attempt` (1-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.base.as_secs_f64() * self.growth_factor.powi(exponent);
        let capped = secs.min(self.max_delay.as_secs_f64());
        if capped.is_finite() {
            Duration::from_secs_f64(capped)
        } else {
            self.max_delay
        }
    }
}
