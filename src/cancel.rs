//! Cooperative cancellation for scan and hydration operations.
//!
//! A [`CancelToken`] is an explicit value threaded through every traversal
//! call. There is no preemption: the token is polled at the top of each
//! per-directory loop and before each entry, so a scan blocked on one slow
//! I/O call finishes that call before noticing cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Result, TreeError};

/// A shared cancellation flag. Cloning hands out another handle to the same
/// flag; any clone can cancel.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Poll point: returns `Err(TreeError::Cancelled)` once cancellation was
    /// requested, so traversal loops can unwind with `?`.
    #[inline]
    pub fn checkpoint(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(TreeError::Cancelled)
        } else {
            Ok(())
        }
    }
}
