//! Throttle Module
//!
//! Wraps a function so that its results are cached per key and only
//! recomputed once they are stale.

mod options;
mod policy;

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::runtime::Handle;
use tracing::{debug, trace};

use crate::cache::{
    Begin, CacheEntry, LruCache, Observer, Reservation, SharedStore, Store, ThrottleStats,
};
use crate::error::{self, ThrottleError};
use crate::key::CacheKey;
use crate::outcome::{Cached, Computation, PendingResult};
use crate::weak::WeakHandle;

pub use options::{Options, Resolver};
pub use policy::{ErrorHandler, OnError};

type WrappedFn<A, T, E> = Arc<dyn Fn(A) -> Computation<T, E> + Send + Sync>;

// == Throttled ==
/// A function wrapped with a result cache.
///
/// Cloning yields another handle sharing the same cache.
pub struct Throttled<A, T, E> {
    func: WrappedFn<A, T, E>,
    store: Arc<SharedStore<T, E>>,
    resolver: Resolver<A>,
    delay: Option<Duration>,
    max_age: Option<Duration>,
    on_updated: Option<Observer<T, E>>,
    on_error: OnError<T, E>,
    stats: Arc<Mutex<ThrottleStats>>,
}

/// Wraps `func` with a result cache configured by `options`.
///
/// # Arguments
/// * `func` - Function to throttle, returning a [`Computation`]
/// * `options` - Cache configuration
///
/// # Errors
/// - [`ThrottleError::Unbounded`] when none of `cache`, `max_age` or
///   `max_size` is set and unbounded growth was not explicitly allowed
/// - [`ThrottleError::InvalidMaxSize`] when `max_size` is zero
///
/// # Example
/// ```
/// use std::time::Duration;
/// use ::throttle::{throttle, Computation, Options};
///
/// let double = throttle(
///     |n: u32| Computation::ready(Ok::<_, ::throttle::ThrottleError>(n * 2)),
///     Options::new().max_age(Duration::from_secs(60)),
/// )
/// .unwrap();
///
/// assert_eq!(double.call(21).unwrap().value(), Some(&42));
/// ```
pub fn throttle<A, T, E, F>(
    func: F,
    options: Options<A, T, E>,
) -> Result<Throttled<A, T, E>, ThrottleError>
where
    A: Serialize + 'static,
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
    F: Fn(A) -> Computation<T, E> + Send + Sync + 'static,
{
    if options.is_unbounded() && !options.allow_unbounded {
        return Err(ThrottleError::Unbounded);
    }
    if options.max_size == Some(0) {
        return Err(ThrottleError::InvalidMaxSize(0));
    }

    let Options {
        delay,
        max_age,
        max_size,
        cache,
        resolver,
        on_updated,
        on_error,
        ..
    } = options;

    let backing: Box<dyn Store<CacheEntry<T, E>>> = match (cache, max_size) {
        (Some(cache), _) => cache,
        (None, Some(max_size)) if max_size < usize::MAX => {
            Box::new(LruCache::<CacheKey, CacheEntry<T, E>>::new(max_size))
        }
        (None, _) => Box::new(HashMap::<CacheKey, CacheEntry<T, E>>::new()),
    };

    let resolver = match resolver {
        Some(resolver) => resolver,
        None => {
            let by_args: Resolver<A> = Arc::new(|args: &A| CacheKey::resolve(args));
            by_args
        }
    };

    debug!(
        delay_ms = delay.map(|d| d.as_millis() as u64),
        max_age_ms = max_age.map(|d| d.as_millis() as u64),
        max_size,
        policy = %on_error,
        "Throttled function created"
    );

    Ok(Throttled {
        func: Arc::new(func),
        store: Arc::new(Mutex::new(backing)),
        resolver,
        delay,
        max_age,
        on_updated,
        on_error,
        stats: Arc::new(Mutex::new(ThrottleStats::new())),
    })
}

/// Wraps a synchronous function.
pub fn throttle_sync<A, T, E, F>(
    func: F,
    options: Options<A, T, E>,
) -> Result<Throttled<A, T, E>, ThrottleError>
where
    A: Serialize + 'static,
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
    F: Fn(A) -> Result<T, E> + Send + Sync + 'static,
{
    throttle(move |args| Computation::Ready(func(args)), options)
}

/// Wraps an asynchronous function.
///
/// A call that has to recompute returns immediately with a
/// [`Cached::Pending`] handle shared by every overlapping call for that key.
pub fn throttle_async<A, T, E, F, Fut>(
    func: F,
    options: Options<A, T, E>,
) -> Result<Throttled<A, T, E>, ThrottleError>
where
    A: Serialize + 'static,
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    throttle(move |args| Computation::pending(func(args)), options)
}

impl<A, T, E> Throttled<A, T, E>
where
    A: 'static,
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    // == Call ==
    /// Calls the throttled function.
    ///
    /// Invokes the wrapped function only when the entry for these arguments
    /// is stale. Otherwise replies with, in order of precedence: the pending
    /// handle of a first computation still in flight, the stored error, or
    /// the stored value.
    ///
    /// Concurrent callers for one key never invoke the function twice: one
    /// of them reserves the computation and the others share its handle.
    ///
    /// A key resolution failure is surfaced as `E::from(ThrottleError)`.
    pub fn call(&self, args: A) -> Result<Cached<T, E>, E>
    where
        E: From<ThrottleError>,
    {
        let key = (self.resolver)(&args)?;
        let entry = self.entry_for(key);

        match entry.try_begin(|| E::from(ThrottleError::Abandoned)) {
            Begin::Served(reply) => {
                self.stats.lock().record_hit();
                trace!(key = %entry.key(), "Served from cache");
                reply
            }
            Begin::Reserved(reservation) => {
                self.stats.lock().record_miss();
                self.execute(args, reservation)
            }
        }
    }

    /// Looks up the entry for `key`, creating it on a miss.
    ///
    /// An entry found past its hard expiry is replaced by a fresh one.
    fn entry_for(&self, key: CacheKey) -> CacheEntry<T, E> {
        let mut store = self.store.lock();

        let mut created = None;
        if !store.has(&key) {
            let entry = self.new_entry(&key);
            store.set(key.clone(), entry.clone());
            created = Some(entry);
        }

        match store.get(&key) {
            Some(entry) if entry.is_expired() => {
                debug!(key = %key, "Replacing expired cache entry");
                store.delete(&key);
                let entry = self.new_entry(&key);
                store.set(key, entry.clone());
                entry
            }
            Some(entry) => entry,
            None => created.unwrap_or_else(|| self.new_entry(&key)),
        }
    }

    fn new_entry(&self, key: &CacheKey) -> CacheEntry<T, E> {
        debug!(key = %key, "Cache entry created");
        CacheEntry::new(
            key.clone(),
            self.delay,
            self.max_age,
            WeakHandle::new(&self.store),
            self.on_updated.clone(),
        )
    }

    fn execute(&self, args: A, reservation: Reservation<T, E>) -> Result<Cached<T, E>, E> {
        trace!(key = %reservation.entry().key(), "Invoking throttled function");

        match (self.func)(args) {
            Computation::Ready(Ok(value)) => {
                reservation.complete_value(value.clone());
                Ok(Cached::Value(value))
            }
            Computation::Ready(Err(err)) => {
                self.stats.lock().record_error();
                let result = self
                    .on_error
                    .handle(err, reservation.entry(), reservation.generation());
                reservation.finish(result.clone());
                result.map(Cached::Value)
            }
            Computation::Pending(future) => Ok(Cached::Pending(self.track(future, reservation))),
        }
    }

    /// Hands an asynchronous computation over to the reservation.
    ///
    /// The returned handle commits a success as the entry's value and routes
    /// a failure through the error policy. When a tokio runtime is available
    /// the handle is driven to completion in the background, so the entry
    /// settles even if no caller awaits it.
    fn track(
        &self,
        future: futures::future::BoxFuture<'static, Result<T, E>>,
        reservation: Reservation<T, E>,
    ) -> PendingResult<T, E> {
        let generation = reservation.generation();
        let owner = reservation.entry().clone();
        let on_error = self.on_error.clone();
        let stats = Arc::clone(&self.stats);

        let computation = async move {
            let outcome = match future.await {
                Ok(value) => {
                    owner.commit_value(generation, value.clone());
                    Ok(value)
                }
                Err(err) => {
                    stats.lock().record_error();
                    on_error.handle(err, &owner, generation)
                }
            };
            owner.settle(generation);
            outcome
        }
        .boxed()
        .shared();

        let pending = reservation.handle();
        reservation.run(computation);

        if let Ok(runtime) = Handle::try_current() {
            runtime.spawn(pending.clone().map(drop));
        }

        pending
    }

    // == Clear ==
    /// Empties the whole cache.
    pub fn clear(&self) {
        self.store.lock().clear();
        debug!("Throttle cache cleared");
    }

    /// Removes only the entry these arguments resolve to.
    ///
    /// Returns whether an entry was removed.
    pub fn clear_args(&self, args: &A) -> error::Result<bool> {
        let key = (self.resolver)(args)?;
        let removed = self.store.lock().delete(&key);
        debug!(key = %key, removed, "Throttle cache entry cleared");
        Ok(removed)
    }

    // == Inspection ==
    /// Returns the entry these arguments resolve to, if cached.
    pub fn entry(&self, args: &A) -> error::Result<Option<CacheEntry<T, E>>> {
        let key = (self.resolver)(args)?;
        let mut store = self.store.lock();
        if !store.has(&key) {
            return Ok(None);
        }
        Ok(store.get(&key))
    }

    /// Returns a snapshot of the call counters.
    pub fn stats(&self) -> ThrottleStats {
        self.stats.lock().clone()
    }
}

impl<A, T, E> Clone for Throttled<A, T, E> {
    fn clone(&self) -> Self {
        Self {
            func: Arc::clone(&self.func),
            store: Arc::clone(&self.store),
            resolver: Arc::clone(&self.resolver),
            delay: self.delay,
            max_age: self.max_age,
            on_updated: self.on_updated.clone(),
            on_error: self.on_error.clone(),
            stats: Arc::clone(&self.stats),
        }
    }
}

impl<A, T, E> fmt::Debug for Throttled<A, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Throttled")
            .field("delay", &self.delay)
            .field("max_age", &self.max_age)
            .field("on_error", &self.on_error)
            .field("stats", &*self.stats.lock())
            .finish()
    }
}
