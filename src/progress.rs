use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// Interval between progress samples.
pub const PROGRESS_TICK: Duration = Duration::from_millis(100);

/// Shared search counters, updated from worker threads and sampled by the
/// progress reporter. All accesses are single atomic operations.
#[derive(Debug, Default)]
pub(crate) struct SearchCounters {
    total: AtomicU64,
    done: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
    matched_files: AtomicU64,
}

impl SearchCounters {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_done(&self) {
        self.done.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_matched_file(&self) {
        self.matched_files.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn set_total(&self, total: u64) {
        self.total.store(total, Ordering::Relaxed);
    }

    /// Zeroes the per-pass counters before a sequential retry; `total` is
    /// left alone because the probe walks the sequence only once.
    pub(crate) fn reset_progress(&self) {
        self.done.swap(0, Ordering::Relaxed);
        self.failed.swap(0, Ordering::Relaxed);
        self.skipped.swap(0, Ordering::Relaxed);
        self.matched_files.swap(0, Ordering::Relaxed);
    }

    pub(crate) fn reset_all(&self) {
        self.reset_progress();
        self.total.store(0, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            done: self.done.load(Ordering::Relaxed),
            total: self.total.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            matched_files: self.matched_files.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of the counters.
///
/// `total` is best effort: it is filled in by a probe that walks the source
/// sequence separately from the scan, stays 0 while unknown, and may disagree
/// with `done` if the sequence is not idempotent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub done: u64,
    pub total: u64,
    pub failed: u64,
    pub skipped: u64,
    pub matched_files: u64,
}

/// Cooperative cancellation flag, observed at every I/O boundary.
#[derive(Debug, Default)]
pub(crate) struct CancelToken {
    cancelled: AtomicBool,
}

impl CancelToken {
    pub(crate) fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub(crate) fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}
