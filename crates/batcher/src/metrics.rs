//! Batcher metrics

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use contracts::FlushReason;

#[derive(Debug, Default)]
pub struct BatcherMetrics {
    records: AtomicU64,
    count_flushes: AtomicU64,
    timer_flushes: AtomicU64,
    shutdown_flushes: AtomicU64,
    empty_windows: AtomicU64,
    pending: AtomicUsize,
}

impl BatcherMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_records(&self) {
        self.records.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_flush(&self, reason: FlushReason) {
        let counter = match reason {
            FlushReason::Count => &self.count_flushes,
            FlushReason::Timer => &self.timer_flushes,
            FlushReason::Shutdown => &self.shutdown_flushes,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_empty_windows(&self) {
        self.empty_windows.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_pending(&self, depth: usize) {
        self.pending.store(depth, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> BatcherSnapshot {
        let count = self.count_flushes.load(Ordering::Relaxed);
        let timer = self.timer_flushes.load(Ordering::Relaxed);
        let shutdown = self.shutdown_flushes.load(Ordering::Relaxed);
        BatcherSnapshot {
            records: self.records.load(Ordering::Relaxed),
            batches: count + timer + shutdown,
            count_flushes: count,
            timer_flushes: timer,
            shutdown_flushes: shutdown,
            empty_windows: self.empty_windows.load(Ordering::Relaxed),
            pending: self.pending.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of batcher metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatcherSnapshot {
    pub records: u64,
    pub batches: u64,
    pub count_flushes: u64,
    pub timer_flushes: u64,
    pub shutdown_flushes: u64,
    pub empty_windows: u64,
    pub pending: usize,
}
