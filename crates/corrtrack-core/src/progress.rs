//! Process-wide progress reporting for long-running engine operations.
//!
//! The engine never owns a UI. It publishes progress through the
//! [`ProgressReporter`] trait; a host wires that to whatever it needs
//! (a channel, a repaint request, a progress bar, or nothing at all).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Callback interface a host implements to observe a long-running operation.
///
/// Methods take `&self` so a single reporter can be shared (via `Arc`)
/// across worker threads without the engine needing to know how the host
/// serializes updates.
pub trait ProgressReporter: Send + Sync {
    /// Called once before work starts, with the total step count.
    fn begin(&self, total: usize);
    /// Called after each step completes, with the 0-based count of steps
    /// done so far.
    fn advance(&self, step: usize);
    /// Called once after the operation finishes (success or failure).
    fn finish(&self) {}
}

/// A [`ProgressReporter`] that does nothing, for hosts that don't care.
#[derive(Default)]
pub struct NullProgress;

impl ProgressReporter for NullProgress {
    fn begin(&self, _total: usize) {}
    fn advance(&self, _step: usize) {}
}

/// A monotonically increasing `(step, total)` pair, readable without
/// locking. Readers tolerate transient inconsistency (a dirty read of
/// `step` against a stale `total`) because both fields only ever increase
/// within a single run.
#[derive(Default)]
pub struct ProgressCursor {
    step: AtomicUsize,
    total: AtomicUsize,
}

impl ProgressCursor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            step: AtomicUsize::new(0),
            total: AtomicUsize::new(0),
        })
    }

    pub fn set_total(&self, total: usize) {
        self.total.store(total, Ordering::Relaxed);
        self.step.store(0, Ordering::Relaxed);
    }

    pub fn set_step(&self, step: usize) {
        self.step.store(step, Ordering::Relaxed);
    }

    /// Read the current `(step, total)` pair.
    pub fn get(&self) -> (usize, usize) {
        (
            self.step.load(Ordering::Relaxed),
            self.total.load(Ordering::Relaxed),
        )
    }
}

impl ProgressReporter for ProgressCursor {
    fn begin(&self, total: usize) {
        self.set_total(total);
    }

    fn advance(&self, step: usize) {
        self.set_step(step);
    }
}
