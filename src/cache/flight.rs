//! In-Flight Computation Module
//!
//! The reservation held by the one caller allowed to recompute a key, and the
//! channel through which every overlapping caller receives that result.

use futures::channel::oneshot;
use tracing::debug;

use crate::cache::CacheEntry;
use crate::outcome::{Cached, PendingResult};

/// What the reserving caller hands over to everyone waiting on it.
pub(crate) enum Delivery<T, E> {
    /// The wrapped function completed synchronously
    Settled(Result<T, E>),
    /// The wrapped function continues in this handle
    Running(PendingResult<T, E>),
}

/// Outcome of trying to start a computation on an entry.
pub(crate) enum Begin<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Entry is fresh, or another caller is already computing it
    Served(Result<Cached<T, E>, E>),
    /// Caller holds the only right to recompute
    Reserved(Reservation<T, E>),
}

// == Reservation ==
/// Exclusive right to recompute one entry.
///
/// Taken atomically with the staleness check, so a key never has two
/// computations in flight. A reservation dropped without being completed
/// (the wrapped function panicked) releases the entry and fails its waiters.
pub(crate) struct Reservation<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    entry: CacheEntry<T, E>,
    generation: u64,
    handle: PendingResult<T, E>,
    sender: Option<oneshot::Sender<Delivery<T, E>>>,
}

impl<T, E> Reservation<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(
        entry: CacheEntry<T, E>,
        generation: u64,
        handle: PendingResult<T, E>,
        sender: oneshot::Sender<Delivery<T, E>>,
    ) -> Self {
        Self {
            entry,
            generation,
            handle,
            sender: Some(sender),
        }
    }

    pub(crate) fn entry(&self) -> &CacheEntry<T, E> {
        &self.entry
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns the handle every overlapping caller shares.
    pub(crate) fn handle(&self) -> PendingResult<T, E> {
        self.handle.clone()
    }

    // == Completion ==
    /// Commits a synchronous success and wakes the waiters.
    pub(crate) fn complete_value(mut self, value: T) {
        self.entry.commit_value(self.generation, value.clone());
        self.deliver(Delivery::Settled(Ok(value)));
    }

    /// Releases the entry with the result the error policy decided on.
    pub(crate) fn finish(mut self, result: Result<T, E>) {
        self.entry.settle(self.generation);
        self.deliver(Delivery::Settled(result));
    }

    /// Hands the computation over to an asynchronous handle. The handle
    /// commits and releases the entry itself once it settles.
    pub(crate) fn run(mut self, computation: PendingResult<T, E>) {
        self.entry.mark_async(self.generation);
        self.deliver(Delivery::Running(computation));
    }

    fn deliver(&mut self, delivery: Delivery<T, E>) {
        if let Some(sender) = self.sender.take() {
            // No one left waiting
            let _ = sender.send(delivery);
        }
    }
}

impl<T, E> Drop for Reservation<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        if self.sender.is_some() {
            debug!(
                key = %self.entry.key(),
                generation = self.generation,
                "Computation abandoned"
            );
            self.entry.settle(self.generation);
        }
    }
}
