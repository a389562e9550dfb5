//! Cooperative cancellation for long-running bring-up and session calls.
//!
//! Every blocking wait in the crate polls a [`CancelToken`]. Raising it never
//! interrupts a call outright: subprocess waits notice it on their next poll,
//! sleeps wake within one slice, and UDP receive loops are woken by the stop
//! sentinel sent from [`Session::close`](crate::transport::Session::close).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Granularity of [`CancelToken::sleep`].
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Shared cancellation flag.
///
/// Clones observe the same flag, so a token handed to a long-running call can
/// be raised from a signal handler or another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    raised: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a token in the cleared state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
    }

    /// Reset the token before a new bring-up attempt.
    pub fn clear(&self) {
        self.raised.store(false, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }

    /// Sleep for `duration` unless cancelled first.
    ///
    /// Returns `true` if the full duration elapsed and `false` if the token
    /// was raised before or during the sleep.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_raised() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep(SLEEP_SLICE.min(deadline - now));
        }
    }
}
