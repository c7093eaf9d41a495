/// Session cancellation handle
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Handle that signals cancellation of a session from another thread.
///
/// `StopHandle` is `Clone + Send + Sync`. Raising it does not interrupt a
/// query that is already waiting on the stream; it stops the pass-through
/// relay and tells callers not to issue further queries.
#[derive(Clone, Debug)]
pub struct StopHandle {
    shutdown_flag: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new(shutdown_flag: Arc<AtomicBool>) -> Self {
        Self { shutdown_flag }
    }

    /// Request cancellation. Idempotent.
    pub fn stop(&self) {
        self.shutdown_flag.store(true, Ordering::Release);
    }

    /// `false` once `stop()` has been called on any clone.
    pub fn is_running(&self) -> bool {
        !self.shutdown_flag.load(Ordering::Acquire)
    }
}
