//! Options Module
//!
//! Builder for everything a throttled function can be configured with.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::cache::{CacheEntry, Observer, Store};
use crate::error::Result;
use crate::key::CacheKey;
use crate::throttle::OnError;

/// Maps call arguments to a cache key.
pub type Resolver<A> = Arc<dyn Fn(&A) -> Result<CacheKey> + Send + Sync>;

// == Options ==
/// Configuration of a throttled function.
///
/// At least one of [`cache`](Self::cache), [`max_age`](Self::max_age) or
/// [`max_size`](Self::max_size) must be set, unless unbounded growth is
/// requested explicitly with [`allow_unbounded`](Self::allow_unbounded).
pub struct Options<A, T, E> {
    pub(crate) delay: Option<Duration>,
    pub(crate) max_age: Option<Duration>,
    pub(crate) max_size: Option<usize>,
    pub(crate) cache: Option<Box<dyn Store<CacheEntry<T, E>>>>,
    pub(crate) resolver: Option<Resolver<A>>,
    pub(crate) on_updated: Option<Observer<T, E>>,
    pub(crate) on_error: OnError<T, E>,
    pub(crate) allow_unbounded: bool,
}

impl<A, T, E> Options<A, T, E> {
    /// Creates options with every setting at its default.
    ///
    /// Defaults: never refresh, never expire, no size limit, key from the
    /// full argument value, `cached` error policy.
    pub fn new() -> Self {
        Self {
            delay: None,
            max_age: None,
            max_size: None,
            cache: None,
            resolver: None,
            on_updated: None,
            on_error: OnError::Cached,
            allow_unbounded: false,
        }
    }

    /// Minimum time between two invocations for the same key.
    ///
    /// `Duration::ZERO` invokes the function on every call.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Time after which an entry is removed, however often it is used.
    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// Maximum number of keys kept, least recently used evicted first.
    ///
    /// `usize::MAX` means no limit.
    pub fn max_size(mut self, max_size: usize) -> Self {
        self.max_size = Some(max_size);
        self
    }

    /// Uses a caller-supplied store. `max_size` is ignored in that case.
    pub fn cache<S>(mut self, store: S) -> Self
    where
        S: Store<CacheEntry<T, E>> + 'static,
    {
        self.cache = Some(Box::new(store));
        self
    }

    /// Derives key material from the call arguments.
    pub fn resolver<R, M>(mut self, resolver: R) -> Self
    where
        A: 'static,
        R: Fn(&A) -> M + Send + Sync + 'static,
        M: Serialize + 'static,
    {
        self.resolver = Some(Arc::new(move |args: &A| CacheKey::resolve(&resolver(args))));
        self
    }

    /// Runs `observer` after every value or error commit.
    pub fn on_updated<F>(mut self, observer: F) -> Self
    where
        F: Fn(&CacheEntry<T, E>) + Send + Sync + 'static,
    {
        self.on_updated = Some(Arc::new(observer));
        self
    }

    /// Selects the error policy.
    pub fn on_error(mut self, policy: OnError<T, E>) -> Self {
        self.on_error = policy;
        self
    }

    /// Accepts a cache that neither expires nor has a size limit.
    pub fn allow_unbounded(mut self) -> Self {
        self.allow_unbounded = true;
        self
    }

    /// Returns true when nothing limits the growth of the cache.
    pub(crate) fn is_unbounded(&self) -> bool {
        self.cache.is_none() && self.max_age.is_none() && self.max_size.is_none()
    }
}

impl<A, T, E> Default for Options<A, T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A, T, E> fmt::Debug for Options<A, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("delay", &self.delay)
            .field("max_age", &self.max_age)
            .field("max_size", &self.max_size)
            .field("cache", &self.cache.is_some())
            .field("resolver", &self.resolver.is_some())
            .field("on_updated", &self.on_updated.is_some())
            .field("on_error", &self.on_error)
            .field("allow_unbounded", &self.allow_unbounded)
            .finish()
    }
}
