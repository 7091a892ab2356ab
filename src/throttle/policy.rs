//! Error Policy Module
//!
//! Decides what a failing call returns and what happens to its cache entry.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::debug;

use crate::cache::CacheEntry;
use crate::error::ThrottleError;

/// Custom error handler: receives the raw error and the entry it concerns.
///
/// `Ok` becomes the call's result, `Err` is surfaced to the caller.
pub type ErrorHandler<T, E> = Arc<dyn Fn(E, &CacheEntry<T, E>) -> Result<T, E> + Send + Sync>;

// == On Error ==
/// Policy applied when the wrapped function fails.
///
/// | Policy    | Entry                                | Call result                         |
/// |-----------|--------------------------------------|-------------------------------------|
/// | `Clear`   | removed from the store               | fails with the error                |
/// | `Persist` | stores the error                     | fails with the error                |
/// | `Cached`  | untouched                            | last value if any, else the error   |
/// | `Custom`  | whatever the handler does            | whatever the handler returns        |
pub enum OnError<T, E> {
    /// Evict the entry and fail
    Clear,
    /// Remember the error so later calls fail with it until it is replaced
    Persist,
    /// Serve the previous value when there is one
    Cached,
    /// Delegate entirely to a handler
    Custom(ErrorHandler<T, E>),
}

impl<T, E> OnError<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Wraps a custom handler.
    pub fn custom<F>(handler: F) -> Self
    where
        F: Fn(E, &CacheEntry<T, E>) -> Result<T, E> + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(handler))
    }

    /// Routes `err` for `entry` through this policy.
    ///
    /// `generation` identifies the failed computation, so that persisting its
    /// error never releases a newer computation on the same entry.
    pub(crate) fn handle(
        &self,
        err: E,
        entry: &CacheEntry<T, E>,
        generation: u64,
    ) -> Result<T, E> {
        debug!(key = %entry.key(), policy = %self, "Routing failure through error policy");

        match self {
            Self::Clear => {
                entry.clear();
                Err(err)
            }
            Self::Persist => {
                entry.commit_error(generation, err.clone());
                Err(err)
            }
            Self::Cached => match entry.value() {
                Some(value) if entry.is_initialized() => Ok(value),
                _ => Err(err),
            },
            Self::Custom(handler) => handler(err, entry),
        }
    }
}

impl<T, E> Default for OnError<T, E> {
    fn default() -> Self {
        Self::Cached
    }
}

impl<T, E> Clone for OnError<T, E> {
    fn clone(&self) -> Self {
        match self {
            Self::Clear => Self::Clear,
            Self::Persist => Self::Persist,
            Self::Cached => Self::Cached,
            Self::Custom(handler) => Self::Custom(Arc::clone(handler)),
        }
    }
}

impl<T, E> FromStr for OnError<T, E> {
    type Err = ThrottleError;

    /// Parses a built-in policy name: `clear`, `persist` or `cached`.
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.trim().to_ascii_lowercase().as_str() {
            "clear" => Ok(Self::Clear),
            "persist" => Ok(Self::Persist),
            "cached" => Ok(Self::Cached),
            _ => Err(ThrottleError::UnknownPolicy(name.to_string())),
        }
    }
}

impl<T, E> fmt::Display for OnError<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Clear => "clear",
            Self::Persist => "persist",
            Self::Cached => "cached",
            Self::Custom(_) => "custom",
        })
    }
}

impl<T, E> fmt::Debug for OnError<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OnError::{self}")
    }
}
