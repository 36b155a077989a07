//! Shutdown signal
//!
//! Process-wide stop flag owned by the server and handed by clone to the
//! listener and every session. Set at most once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// Cooperative cancellation flag shared by the listener and sessions
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    triggered: AtomicBool,
    fault: Mutex<Option<String>>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request an orderly shutdown
    ///
    /// Returns true if this call set the signal.
    pub fn trigger(&self) -> bool {
        !self.inner.triggered.swap(true, Ordering::SeqCst)
    }

    /// Request shutdown because of a session fault
    ///
    /// The reason is recorded only if this call set the signal.
    pub fn trigger_fault(&self, reason: impl Into<String>) -> bool {
        // Hold the lock across the swap so a reader never sees the flag
        // without the reason that set it.
        let mut fault = self.inner.fault.lock();
        let first = !self.inner.triggered.swap(true, Ordering::SeqCst);
        if first {
            *fault = Some(reason.into());
        }
        first
    }

    pub fn is_triggered(&self) -> bool {
        self.inner.triggered.load(Ordering::SeqCst)
    }

    /// The fault that triggered shutdown, if any
    pub fn fault(&self) -> Option<String> {
        self.inner.fault.lock().clone()
    }
}
