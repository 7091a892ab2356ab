//! Configuration Module
//!
//! Loads throttling parameters from environment variables.

use std::env;
use std::time::Duration;

use crate::error::Result;
use crate::throttle::{OnError, Options};

/// Throttling parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThrottleConfig {
    /// Refresh window in milliseconds
    pub delay_ms: u64,
    /// Hard expiry in milliseconds, 0 = never expire
    pub max_age_ms: u64,
    /// Maximum number of cached keys
    pub max_size: usize,
    /// Error policy name: `clear`, `persist` or `cached`
    pub on_error: String,
}

impl ThrottleConfig {
    /// Creates a new ThrottleConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `THROTTLE_DELAY_MS` - Refresh window in milliseconds (default: 1000)
    /// - `THROTTLE_MAX_AGE_MS` - Hard expiry in milliseconds (default: 60000)
    /// - `THROTTLE_MAX_SIZE` - Maximum cached keys (default: 1000)
    /// - `THROTTLE_ON_ERROR` - Error policy name (default: cached)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            delay_ms: env::var("THROTTLE_DELAY_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.delay_ms),
            max_age_ms: env::var("THROTTLE_MAX_AGE_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_age_ms),
            max_size: env::var("THROTTLE_MAX_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_size),
            on_error: env::var("THROTTLE_ON_ERROR").unwrap_or(defaults.on_error),
        }
    }

    /// Returns the refresh window.
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Returns the hard expiry, None when disabled.
    pub fn max_age(&self) -> Option<Duration> {
        (self.max_age_ms > 0).then(|| Duration::from_millis(self.max_age_ms))
    }

    /// Applies these parameters onto an options builder.
    ///
    /// Fails when `on_error` does not name a built-in policy.
    pub fn apply<A, T, E>(&self, options: Options<A, T, E>) -> Result<Options<A, T, E>> {
        let policy: OnError<T, E> = self.on_error.parse()?;
        let options = options
            .delay(self.delay())
            .max_size(self.max_size)
            .on_error(policy);

        Ok(match self.max_age() {
            Some(max_age) => options.max_age(max_age),
            None => options,
        })
    }
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            delay_ms: 1000,
            max_age_ms: 60_000,
            max_size: 1000,
            on_error: "cached".to_string(),
        }
    }
}
