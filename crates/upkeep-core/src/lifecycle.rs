//! Host lifecycle coupling
//!
//! The runtime consumes exactly two edges from the surrounding application:
//! a one-shot "host is ready" broadcast (workers must not start before it)
//! and a one-shot "shutdown has begun" flag. Everything else a host
//! lifecycle framework may report is accepted and ignored.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};

/// Coarse host application phase, as reported to [`HostReporter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerPhase {
    /// Host still initializing features.
    Booting,
    /// Host fully initialized and serving; workers may start.
    Ready,
    /// Shutdown has begun.
    ShuttingDown,
    /// Host torn down.
    Stopped,
}

/// Shared ready/shutdown state: an edge-triggered ready broadcast plus a
/// sticky shutdown flag.
pub struct Lifecycle {
    ready: Mutex<bool>,
    ready_cond: Condvar,
    shutdown: AtomicBool,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            ready: Mutex::new(false),
            ready_cond: Condvar::new(),
            shutdown: AtomicBool::new(false),
        }
    }

    /// Record the host ready edge and wake every waiter. Idempotent.
    pub fn notify_ready(&self) {
        let mut ready = self.ready.lock().unwrap_or_else(PoisonError::into_inner);
        if !*ready {
            *ready = true;
            tracing::debug!("host ready edge observed");
        }
        self.ready_cond.notify_all();
    }

    /// Block until the ready edge has been observed (or shutdown begins,
    /// so a late starter is not stranded).
    pub fn wait_until_ready(&self) {
        let mut ready = self.ready.lock().unwrap_or_else(PoisonError::into_inner);
        while !*ready && !self.shutdown_requested() {
            ready = self
                .ready_cond
                .wait(ready)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    pub fn is_ready(&self) -> bool {
        *self.ready.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the shutdown-begin edge. Sticky; also wakes ready-waiters.
    pub fn begin_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.ready_cond.notify_all();
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Observer handed to the host lifecycle framework.
///
/// Only `state_change(ServerPhase::Ready)` is semantically consumed; all
/// other phase and feature notifications are accepted and dropped.
#[derive(Clone)]
pub struct HostReporter {
    lifecycle: Arc<Lifecycle>,
}

impl HostReporter {
    pub(crate) fn new(lifecycle: Arc<Lifecycle>) -> Self {
        Self { lifecycle }
    }

    pub fn state_change(&self, phase: ServerPhase) {
        if phase == ServerPhase::Ready {
            self.lifecycle.notify_ready();
        }
    }

    pub fn feature_change(&self, _phase: ServerPhase, _feature: &str) {}
}
