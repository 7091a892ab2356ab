//! Cache Module
//!
//! Backing stores, per-key cache entries and call statistics.

mod entry;
mod flight;
mod lru;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use entry::{CacheEntry, Observer, SharedStore};
pub(crate) use flight::{Begin, Reservation};
pub use lru::LruCache;
pub use stats::ThrottleStats;
pub use store::Store;
