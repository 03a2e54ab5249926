use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::StorageError;

/// An opaque cancellation handle threaded through every operation.
///
/// The core only forwards the context to the storage layer; a cancelled
/// context makes the next store access fail with
/// [`StorageError::Cancelled`], aborting the operation at that boundary and
/// leaving the tree in its previous committed state.
///
/// Clones share the cancellation flag:
///
/// ```rust
/// # use rzks::Context;
/// let ctx = Context::new();
/// let handle = ctx.clone();
///
/// assert!(!ctx.is_cancelled());
/// handle.cancel();
/// assert!(ctx.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Context {
    cancelled: Arc<AtomicBool>,
}

impl Context {
    /// Create a fresh, non-cancelled context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation to every clone of this context.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been signalled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Fail with [`StorageError::Cancelled`] if cancellation was signalled.
    pub(crate) fn check(&self) -> Result<(), StorageError> {
        if self.is_cancelled() {
            return Err(StorageError::Cancelled);
        }
        Ok(())
    }
}
