//! Outcome Types
//!
//! What a wrapped function hands back, and what a throttled call hands back.

use std::fmt;
use std::future::Future;

use futures::future::{BoxFuture, FutureExt, Shared};

// == Pending Result ==
/// Cloneable handle to an in-flight computation.
///
/// Every clone resolves to the same result.
pub type PendingResult<T, E> = Shared<BoxFuture<'static, Result<T, E>>>;

/// Creates an already-resolved handle that fails with `err`.
pub(crate) fn rejected<T, E>(err: E) -> PendingResult<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    futures::future::ready(Err(err)).boxed().shared()
}

// == Computation ==
/// Result of invoking a wrapped function.
pub enum Computation<T, E> {
    /// The function completed (or failed) synchronously
    Ready(Result<T, E>),
    /// The function started asynchronous work
    Pending(BoxFuture<'static, Result<T, E>>),
}

impl<T, E> Computation<T, E> {
    /// Wraps a synchronous result.
    pub fn ready(result: Result<T, E>) -> Self {
        Self::Ready(result)
    }

    /// Wraps an asynchronous result.
    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self::Pending(future.boxed())
    }
}

impl<T, E> From<Result<T, E>> for Computation<T, E> {
    fn from(result: Result<T, E>) -> Self {
        Self::Ready(result)
    }
}

impl<T, E> fmt::Debug for Computation<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(result) => f
                .debug_tuple("Ready")
                .field(&if result.is_ok() { "Ok" } else { "Err" })
                .finish(),
            Self::Pending(_) => f.write_str("Pending"),
        }
    }
}

// == Cached ==
/// Successful reply of a throttled call.
pub enum Cached<T, E> {
    /// Value available synchronously
    Value(T),
    /// Handle to a computation that has not settled yet, or that settled
    /// into a failure surfaced asynchronously
    Pending(PendingResult<T, E>),
}

impl<T, E> Cached<T, E>
where
    T: Clone,
    E: Clone,
{
    /// Waits for the reply, whichever shape it has.
    pub async fn resolve(self) -> Result<T, E> {
        match self {
            Self::Value(value) => Ok(value),
            Self::Pending(pending) => pending.await,
        }
    }

    /// Returns the value if it is available without waiting.
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Value(value) => Some(value),
            Self::Pending(_) => None,
        }
    }

    /// Returns true when the caller has to await the reply.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    /// Returns the pending handle, if any.
    pub fn into_pending(self) -> Option<PendingResult<T, E>> {
        match self {
            Self::Value(_) => None,
            Self::Pending(pending) => Some(pending),
        }
    }
}

impl<T: fmt::Debug, E> fmt::Debug for Cached<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Pending(_) => f.write_str("Pending"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cached_value_resolves_immediately() {
        let cached: Cached<u32, String> = Cached::Value(3);

        assert_eq!(cached.value(), Some(&3));
        assert!(!cached.is_pending());
        assert_eq!(cached.resolve().await, Ok(3));
    }

    #[tokio::test]
    async fn test_rejected_handle_is_shared() {
        let handle: PendingResult<u32, String> = rejected("boom".to_string());
        let cached = Cached::Pending(handle.clone());

        assert!(cached.is_pending());
        assert_eq!(handle.await, Err("boom".to_string()));
        assert_eq!(cached.resolve().await, Err("boom".to_string()));
    }

    #[tokio::test]
    async fn test_into_pending() {
        let value: Cached<u32, String> = Cached::Value(3);
        assert!(value.into_pending().is_none());

        let pending: Cached<u32, String> =
            Cached::Pending(futures::future::ready(Ok(4)).boxed().shared());
        assert_eq!(pending.into_pending().unwrap().await, Ok(4));
    }

    #[test]
    fn test_computation_from_result() {
        let computation: Computation<u32, String> = Ok(1).into();
        assert!(matches!(computation, Computation::Ready(Ok(1))));
        assert_eq!(format!("{computation:?}"), "Ready(\"Ok\")");
    }
}
