//! Throttle Statistics Module
//!
//! Tracks how often a throttled function served from cache versus invoking
//! the wrapped function.

use serde::Serialize;

// == Throttle Stats ==
/// Call counters of one throttled function.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ThrottleStats {
    /// Calls answered without invoking the wrapped function
    pub hits: u64,
    /// Calls that invoked the wrapped function
    pub misses: u64,
    /// Failures routed through the error policy
    pub errors: u64,
}

impl ThrottleStats {
    // == Constructor ==
    /// Creates a new ThrottleStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no calls have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    // == Record Hit ==
    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    // == Record Miss ==
    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    // == Record Error ==
    pub fn record_error(&mut self) {
        self.errors += 1;
    }
}
