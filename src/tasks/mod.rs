//! Background Tasks Module
//!
//! Contains the timer tasks spawned on behalf of cache entries.
//!
//! # Tasks
//! - Expiry: Removes a cache entry from its store once its max age elapses

mod expiry;

pub use expiry::{spawn_expiry_timer, ExpiryTimer};
