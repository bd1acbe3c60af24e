//! Cooperative cancellation handle.
//!
//! An explicit, clonable token owned by the execution coordinator and shared
//! with signal handlers and the interface layer. Checked before each unit of
//! work begins; in-flight operations run to completion. Relaxed atomics are
//! sufficient for a one-way "stop" flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation (idempotent, signal-handler safe).
    #[inline]
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
