//! Cooperative cancellation via a shared set-once flag

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancellation flag, checked at pipeline suspension points.
///
/// Clones observe the same flag. The token is set exactly once: the first
/// `cancel()` wins and later calls are no-ops. Nothing is preempted — an
/// in-flight fetch or scoring chunk runs to completion before the flag is
/// observed at the next suspension point.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag. Returns `true` if this call was the first to set it.
    pub fn cancel(&self) -> bool {
        !self.flag.swap(true, Ordering::Relaxed)
    }

    /// Check whether cancellation was requested. Cheap and idempotent.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}
