use crate::error::AnalysisError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A caller-supplied flag for cooperative cancellation of long-running
/// analyses.
///
/// The token is cloned into the caller's control path and polled by the
/// analysis loops at their iteration boundaries (fixpoint steps, ILP solve
/// returns, search node entries). Cancellation never interrupts a BDD
/// operation in flight, so the shared manager is always left in a valid
/// state.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> CancellationToken {
        CancellationToken::default()
    }

    /// Request cancellation. All clones of this token observe the request.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Turn a pending cancellation request into the `Cancelled` error.
    ///
    /// Intended to be called as `token.checkpoint()?` at loop boundaries.
    pub fn checkpoint(&self) -> Result<(), AnalysisError> {
        if self.is_cancelled() {
            Err(AnalysisError::Cancelled)
        } else {
            Ok(())
        }
    }
}
