//! Expiry Timer Task
//!
//! One-shot background task that hard-expires a single cache entry.

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tracing::{debug, trace};

use crate::key::CacheKey;

// == Expiry Timer ==
/// Handle to a running expiry task.
///
/// The task is cancelled through [`ExpiryTimer::cancel`]. Dropping the handle
/// leaves the task running.
#[derive(Debug)]
pub struct ExpiryTimer {
    /// Arm sequence number, used to ignore fires from superseded timers
    arm: u64,
    handle: AbortHandle,
}

impl ExpiryTimer {
    /// Returns the arm sequence number this timer was spawned with.
    pub fn arm(&self) -> u64 {
        self.arm
    }

    /// Cancels the task. A timer that already fired is unaffected.
    pub fn cancel(self) {
        self.handle.abort();
    }

    /// Checks whether the task has completed or been cancelled.
    #[cfg(test)]
    pub(crate) fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Spawns a task that sleeps for `after` and then runs `on_expire`.
///
/// The task runs on the ambient tokio runtime. Tokio never waits for pending
/// timer tasks at shutdown, so an armed timer does not keep a runtime alive.
///
/// # Arguments
/// * `key` - Key of the entry being expired (for logging)
/// * `arm` - Sequence number identifying this arm of the entry's timer
/// * `after` - Delay before `on_expire` runs
/// * `on_expire` - Callback run once the delay has elapsed
///
/// # Returns
/// None when called outside of a tokio runtime. Callers then rely on the
/// expiry deadline being checked at lookup time.
///
/// # Example
/// ```ignore
/// let timer = spawn_expiry_timer(&key, 1, Duration::from_secs(60), move || entry.clear());
/// // Later, when the entry is refreshed:
/// if let Some(timer) = timer {
///     timer.cancel();
/// }
/// ```
pub fn spawn_expiry_timer<F>(
    key: &CacheKey,
    arm: u64,
    after: Duration,
    on_expire: F,
) -> Option<ExpiryTimer>
where
    F: FnOnce() + Send + 'static,
{
    let Ok(runtime) = Handle::try_current() else {
        trace!(key = %key, "No tokio runtime, expiry checked lazily");
        return None;
    };

    let key = key.clone();
    let task = runtime.spawn(async move {
        tokio::time::sleep(after).await;
        debug!(key = %key, after_ms = after.as_millis() as u64, "Expiry timer fired");
        on_expire();
    });

    Some(ExpiryTimer {
        arm,
        handle: task.abort_handle(),
    })
}
