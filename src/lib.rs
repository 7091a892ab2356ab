//! Throttle - Function-result memoization
//!
//! Wraps a function so that its results are cached per call arguments and
//! served from cache until a refresh delay elapses, with hard expiry, LRU
//! eviction and configurable error policies.

pub mod cache;
pub mod config;
pub mod error;
pub mod key;
pub mod outcome;
pub mod tasks;
pub mod throttle;
pub mod weak;

pub use cache::{CacheEntry, LruCache, Store, ThrottleStats};
pub use config::ThrottleConfig;
pub use error::{Result, ThrottleError};
pub use key::CacheKey;
pub use outcome::{Cached, Computation, PendingResult};
pub use throttle::{throttle, throttle_async, throttle_sync, OnError, Options, Throttled};
pub use weak::WeakHandle;
