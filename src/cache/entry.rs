//! Cache Entry Module
//!
//! Lifecycle of the cached state for a single key: value or error, refresh
//! delay, hard expiry timer and in-flight computation tracking.

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::channel::oneshot;
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::cache::flight::{Begin, Delivery, Reservation};
use crate::cache::Store;
use crate::key::CacheKey;
use crate::outcome::{rejected, Cached, PendingResult};
use crate::tasks::{spawn_expiry_timer, ExpiryTimer};
use crate::weak::WeakHandle;

/// Store shared by every entry of one throttled function.
pub type SharedStore<T, E> = Mutex<Box<dyn Store<CacheEntry<T, E>>>>;

/// Hook invoked after every value or error commit.
pub type Observer<T, E> = Arc<dyn Fn(&CacheEntry<T, E>) + Send + Sync>;

// == Slot ==
/// Last committed outcome.
enum Slot<T, E> {
    Empty,
    Value(T),
    /// Surfaced synchronously by later calls
    Error(E),
    /// Committed while a computation was pending, surfaced through a
    /// resolved pending handle
    Rejected(E),
}

struct InFlight<T, E> {
    generation: u64,
    handle: PendingResult<T, E>,
    /// Set once the wrapped function returned a future
    asynchronous: bool,
}

struct EntryState<T, E> {
    slot: Slot<T, E>,
    initialized: bool,
    pending: Option<InFlight<T, E>>,
    generation: u64,
    updated_at: Option<Instant>,
    last_updated: Option<DateTime<Utc>>,
    delay: Option<Duration>,
    max_age: Option<Duration>,
    expires_at: Option<Instant>,
    timer: Option<ExpiryTimer>,
    arms: u64,
}

impl<T, E> EntryState<T, E> {
    fn is_stale(&self, now: Instant) -> bool {
        if self.pending.is_some() {
            return false;
        }

        match (self.updated_at, self.delay) {
            (None, _) => true,
            (Some(_), Some(delay)) if delay.is_zero() => true,
            (Some(at), Some(delay)) => at.checked_add(delay).is_some_and(|due| due <= now),
            (Some(_), None) => false,
        }
    }

    fn take_timer(&mut self) -> Option<ExpiryTimer> {
        self.expires_at = None;
        self.timer.take()
    }

    fn owns_pending(&self, generation: u64) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|in_flight| in_flight.generation == generation)
    }
}

impl<T, E> EntryState<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Reply for a call that does not recompute, None when there is nothing
    /// to serve yet.
    fn reply(&self) -> Option<Result<Cached<T, E>, E>> {
        if !self.initialized {
            return self
                .pending
                .as_ref()
                .map(|in_flight| Ok(Cached::Pending(in_flight.handle.clone())));
        }

        match &self.slot {
            Slot::Empty => None,
            Slot::Value(value) => Some(Ok(Cached::Value(value.clone()))),
            Slot::Error(err) => Some(Err(err.clone())),
            Slot::Rejected(err) => Some(Ok(Cached::Pending(rejected(err.clone())))),
        }
    }
}

struct EntryInner<T, E> {
    key: CacheKey,
    state: Mutex<EntryState<T, E>>,
    store: WeakHandle<SharedStore<T, E>>,
    on_updated: Option<Observer<T, E>>,
}

impl<T, E> Drop for EntryInner<T, E> {
    fn drop(&mut self) {
        if let Some(timer) = self.state.get_mut().timer.take() {
            timer.cancel();
        }
    }
}

// == Cache Entry ==
/// Cached state for one key.
///
/// Cloning yields another handle to the same entry. The entry reaches its
/// store only through a [`WeakHandle`], so an entry kept alive by an
/// in-flight computation never keeps a discarded store alive.
pub struct CacheEntry<T, E> {
    inner: Arc<EntryInner<T, E>>,
}

impl<T, E> Clone for CacheEntry<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, E> CacheEntry<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates an uninitialized entry.
    ///
    /// # Arguments
    /// * `key` - Resolved cache key
    /// * `delay` - Refresh window, None = never refresh
    /// * `max_age` - Hard expiry, None = never expire
    /// * `store` - Store the entry removes itself from on expiry
    /// * `on_updated` - Observer run after every commit
    pub fn new(
        key: CacheKey,
        delay: Option<Duration>,
        max_age: Option<Duration>,
        store: WeakHandle<SharedStore<T, E>>,
        on_updated: Option<Observer<T, E>>,
    ) -> Self {
        Self {
            inner: Arc::new(EntryInner {
                key,
                state: Mutex::new(EntryState {
                    slot: Slot::Empty,
                    initialized: false,
                    pending: None,
                    generation: 0,
                    updated_at: None,
                    last_updated: None,
                    delay,
                    max_age,
                    expires_at: None,
                    timer: None,
                    arms: 0,
                }),
                store,
                on_updated,
            }),
        }
    }

    /// Returns the key this entry caches.
    pub fn key(&self) -> &CacheKey {
        &self.inner.key
    }

    // == Staleness ==
    /// Checks whether the next call has to invoke the wrapped function.
    ///
    /// An entry with a pending computation is never stale. Otherwise it is
    /// stale when it has never been updated, when its delay is zero, or when
    /// the delay has elapsed since the last update.
    pub fn is_stale(&self) -> bool {
        self.inner.state.lock().is_stale(Instant::now())
    }

    /// Checks whether the hard expiry deadline has passed.
    pub fn is_expired(&self) -> bool {
        self.inner
            .state
            .lock()
            .expires_at
            .is_some_and(|at| at <= Instant::now())
    }

    /// Returns true once a value or error has been committed.
    pub fn is_initialized(&self) -> bool {
        self.inner.state.lock().initialized
    }

    /// Returns true while a computation is in flight, synchronous or not.
    pub fn is_pending(&self) -> bool {
        self.inner.state.lock().pending.is_some()
    }

    /// Returns the in-flight computation, if any.
    pub fn pending(&self) -> Option<PendingResult<T, E>> {
        self.inner
            .state
            .lock()
            .pending
            .as_ref()
            .map(|in_flight| in_flight.handle.clone())
    }

    /// Returns the last committed value.
    pub fn value(&self) -> Option<T> {
        match &self.inner.state.lock().slot {
            Slot::Value(value) => Some(value.clone()),
            _ => None,
        }
    }

    /// Returns the last committed error, whether it is surfaced
    /// synchronously or through a pending handle.
    pub fn error(&self) -> Option<E> {
        match &self.inner.state.lock().slot {
            Slot::Error(err) | Slot::Rejected(err) => Some(err.clone()),
            _ => None,
        }
    }

    /// Returns the monotonic time of the last commit.
    pub fn updated_at(&self) -> Option<Instant> {
        self.inner.state.lock().updated_at
    }

    /// Returns the wall-clock time of the last commit.
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.inner.state.lock().last_updated
    }

    /// Returns the hard expiry deadline of the current cycle.
    pub fn expires_at(&self) -> Option<Instant> {
        self.inner.state.lock().expires_at
    }

    // == Delay ==
    /// Returns the refresh window.
    pub fn delay(&self) -> Option<Duration> {
        self.inner.state.lock().delay
    }

    /// Changes the refresh window. Takes effect on the next staleness check.
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.inner.state.lock().delay = delay;
    }

    // == Max Age ==
    /// Returns the hard expiry duration.
    pub fn max_age(&self) -> Option<Duration> {
        self.inner.state.lock().max_age
    }

    /// Changes the hard expiry duration and re-arms the timer from now.
    ///
    /// `None` cancels the timer: the entry then only goes stale through its
    /// delay and is never removed by time.
    pub fn set_max_age(&self, max_age: Option<Duration>) {
        let previous = {
            let mut state = self.inner.state.lock();
            state.max_age = max_age;
            self.arm(&mut state)
        };

        if let Some(timer) = previous {
            timer.cancel();
        }
    }

    // == Commit ==
    /// Commits a successful result. Clears any stored error and releases
    /// whatever computation is in flight.
    pub fn set_value(&self, value: T) {
        self.store_value(None, value);
    }

    /// Commits a failure. Clears any stored value.
    ///
    /// While an asynchronous computation is pending the failure is recorded
    /// as a rejection: callers holding or later receiving a pending handle
    /// observe it asynchronously instead of failing synchronously.
    pub fn set_error(&self, err: E) {
        self.store_error(None, err);
    }

    /// Commits the success of computation `generation`. A newer computation
    /// in flight stays registered.
    pub(crate) fn commit_value(&self, generation: u64, value: T) {
        self.store_value(Some(generation), value);
    }

    /// Commits the failure of computation `generation`.
    pub(crate) fn commit_error(&self, generation: u64, err: E) {
        self.store_error(Some(generation), err);
    }

    fn store_value(&self, generation: Option<u64>, value: T) {
        let previous = {
            let mut state = self.inner.state.lock();
            state.slot = Slot::Value(value);
            self.updated(&mut state, generation)
        };
        self.notify(previous);
    }

    fn store_error(&self, generation: Option<u64>, err: E) {
        let previous = {
            let mut state = self.inner.state.lock();
            let deferred = state
                .pending
                .as_ref()
                .is_some_and(|in_flight| in_flight.asynchronous);
            state.slot = if deferred {
                Slot::Rejected(err)
            } else {
                Slot::Error(err)
            };
            self.updated(&mut state, generation)
        };
        self.notify(previous);
    }

    /// Stamps the commit and re-arms the expiry timer. Must be called with
    /// the state lock held. Returns the timer it replaces.
    fn updated(
        &self,
        state: &mut EntryState<T, E>,
        generation: Option<u64>,
    ) -> Option<ExpiryTimer> {
        let release = match generation {
            Some(generation) => state.owns_pending(generation),
            None => true,
        };
        if release {
            state.pending = None;
        }

        state.initialized = true;
        state.updated_at = Some(Instant::now());
        state.last_updated = Some(Utc::now());
        self.arm(state)
    }

    /// Runs after a commit, outside the state lock.
    fn notify(&self, previous: Option<ExpiryTimer>) {
        if let Some(timer) = previous {
            timer.cancel();
        }

        debug!(key = %self.inner.key, "Cache entry updated");

        if let Some(observer) = &self.inner.on_updated {
            observer(self);
        }
    }

    /// Arms the expiry timer for the current max age and returns the timer
    /// it replaces. Must be called with the state lock held.
    fn arm(&self, state: &mut EntryState<T, E>) -> Option<ExpiryTimer> {
        let previous = state.take_timer();

        let Some(max_age) = state.max_age else {
            return previous;
        };

        state.arms += 1;
        state.expires_at = Instant::now().checked_add(max_age);

        let arm = state.arms;
        let entry = Arc::downgrade(&self.inner);
        state.timer = spawn_expiry_timer(&self.inner.key, arm, max_age, move || {
            expire(&entry, arm);
        });

        previous
    }

    // == Clear ==
    /// Cancels the expiry timer and removes this entry from its store.
    ///
    /// Only this exact entry is removed: if the store already holds a newer
    /// entry under the same key it is left alone. No-op once the store has
    /// been reclaimed.
    pub fn clear(&self) {
        let timer = self.inner.state.lock().take_timer();
        if let Some(timer) = timer {
            timer.cancel();
        }

        let Some(store) = self.inner.store.resolve() else {
            trace!(key = %self.inner.key, "Store already reclaimed");
            return;
        };

        let mut store = store.lock();
        if !store.has(&self.inner.key) {
            return;
        }

        // Looking must not promote a newer entry that is then left alone
        let current = match store.peek(&self.inner.key) {
            Some(current) => Some(current),
            None => store.get(&self.inner.key),
        };
        let is_current = current.is_some_and(|current| current.ptr_eq(self));
        if is_current {
            store.delete(&self.inner.key);
            debug!(key = %self.inner.key, "Cache entry cleared");
        }
    }

    // == Pending ==
    /// Serves the call from this entry, or reserves the right to recompute it.
    ///
    /// The staleness check and the reservation happen under one lock, so of
    /// any number of concurrent callers exactly one gets
    /// [`Begin::Reserved`]. The others share the reservation's handle, or
    /// the stored value when there is one.
    ///
    /// # Arguments
    /// * `abandoned` - Error waiters receive if the reservation is dropped
    ///   without completing
    pub(crate) fn try_begin<F>(&self, abandoned: F) -> Begin<T, E>
    where
        F: FnOnce() -> E + Send + 'static,
    {
        let mut state = self.inner.state.lock();

        if !state.is_stale(Instant::now()) {
            if let Some(reply) = state.reply() {
                return Begin::Served(reply);
            }
        }

        state.generation += 1;
        let generation = state.generation;

        let (sender, receiver) = oneshot::channel();
        let handle = async move {
            match receiver.await {
                Ok(Delivery::Settled(result)) => result,
                Ok(Delivery::Running(computation)) => computation.await,
                Err(_) => Err(abandoned()),
            }
        }
        .boxed()
        .shared();

        state.pending = Some(InFlight {
            generation,
            handle: handle.clone(),
            asynchronous: false,
        });
        drop(state);

        trace!(key = %self.inner.key, generation, "Computation reserved");
        Begin::Reserved(Reservation::new(self.clone(), generation, handle, sender))
    }

    /// Marks computation `generation` as asynchronous.
    pub(crate) fn mark_async(&self, generation: u64) {
        let mut state = self.inner.state.lock();
        if let Some(in_flight) = state.pending.as_mut() {
            if in_flight.generation == generation {
                in_flight.asynchronous = true;
            }
        }
    }

    /// Drops the pending marker if it still belongs to `generation`.
    pub(crate) fn settle(&self, generation: u64) {
        let mut state = self.inner.state.lock();
        if state.owns_pending(generation) {
            state.pending = None;
        }
    }

    #[cfg(test)]
    pub(crate) fn reply(&self) -> Option<Result<Cached<T, E>, E>> {
        self.inner.state.lock().reply()
    }

    /// Returns true when both handles point to the same entry.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Timer callback: clears the entry unless it was re-armed since.
fn expire<T, E>(entry: &Weak<EntryInner<T, E>>, arm: u64)
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    let Some(inner) = entry.upgrade() else {
        return;
    };

    let entry = CacheEntry { inner };
    let current = entry
        .inner
        .state
        .lock()
        .timer
        .as_ref()
        .is_some_and(|timer| timer.arm() == arm);

    if current {
        entry.clear();
    }
}

impl<T, E> fmt::Debug for CacheEntry<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("CacheEntry")
            .field("key", &self.inner.key)
            .field("initialized", &state.initialized)
            .field("pending", &state.pending.is_some())
            .field("delay", &state.delay)
            .field("max_age", &state.max_age)
            .finish()
    }
}
