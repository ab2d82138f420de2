use docrevdb_core::Result;

use crate::storage::Storage;

/// A scoped, re-entrant database transaction (spec §4.2).
///
/// `Storage::begin` increments a per-store nesting counter; the first
/// (outermost) call issues a real `BEGIN`. Every `TxnScope` must be retired
/// with [`end`](TxnScope::end) exactly once: when the counter returns to
/// zero the transaction commits, unless [`fail`](TxnScope::fail) was called
/// on any scope sharing it, in which case it rolls back instead. The
/// fail-flag is write-once — once set it cannot be cleared before the
/// outermost scope ends.
///
/// Dropping a `TxnScope` without calling `end` leaves the nesting counter
/// elevated; since that can only happen on a bug (an early return that
/// forgot to retire its scope), it's logged rather than silently patched
/// over — there is no async drop to fall back on a rollback here.
#[must_use = "a TxnScope must be retired with `.end()` or the transaction never completes"]
pub struct TxnScope<'a> {
    storage: &'a Storage,
    ended: bool,
}

impl<'a> TxnScope<'a> {
    pub(crate) fn new(storage: &'a Storage) -> Self {
        TxnScope {
            storage,
            ended: false,
        }
    }

    /// Marks the enclosing (outermost) transaction for rollback. Does not
    /// itself return an error or stop execution — callers still return
    /// through their own error path; `end` performs the actual rollback.
    pub fn fail(&self) {
        self.storage.mark_failed();
    }

    /// Retires this scope. Decrements the nesting counter; commits or rolls
    /// back once it reaches zero.
    pub async fn end(mut self) -> Result<()> {
        self.ended = true;
        self.storage.end_scope().await
    }
}

impl Drop for TxnScope<'_> {
    fn drop(&mut self) {
        if !self.ended {
            tracing::warn!("TxnScope dropped without calling end(); transaction left open");
        }
    }
}
