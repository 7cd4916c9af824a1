//! Progress reporting and cooperative cancellation.

use common::error::{CompositeError, CompositeResult};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::info;

/// Polled by renderers at layer and tile boundaries.
///
/// Cancellation is cooperative: a long-running layer only notices it once
/// control returns to the render loop.
pub trait ProgressCallback: Send + Sync {
    /// Whether the render should stop as soon as possible.
    fn is_cancelled(&self) -> bool {
        false
    }

    /// Report that `done` of `total` units of work are complete.
    fn progress(&self, _done: u64, _total: u64) {}
}

/// Fail with [`CompositeError::Cancelled`] if the callback asks to stop.
#[inline]
pub fn check_cancelled(cb: &dyn ProgressCallback) -> CompositeResult<()> {
    if cb.is_cancelled() {
        Err(CompositeError::Cancelled)
    } else {
        Ok(())
    }
}

/// Never cancels, reports nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullProgress;

impl ProgressCallback for NullProgress {}

/// A cancellation switch that can be flipped from another thread.
#[derive(Debug, Default)]
pub struct CancelFlag {
    cancelled: AtomicBool,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// A flag that is already set.
    pub fn cancelled() -> Self {
        let flag = Self::new();
        flag.cancel();
        flag
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::Release);
    }
}

impl ProgressCallback for CancelFlag {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Logs progress in ten-percent steps.
#[derive(Debug)]
pub struct ProgressLog {
    label: String,
    last_decile: AtomicU64,
}

impl ProgressLog {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            last_decile: AtomicU64::new(0),
        }
    }
}

impl ProgressCallback for ProgressLog {
    fn progress(&self, done: u64, total: u64) {
        if total == 0 {
            return;
        }
        let decile = done * 10 / total;
        if self.last_decile.fetch_max(decile, Ordering::AcqRel) < decile {
            info!("{}: {}%", self.label, decile * 10);
        }
    }
}
