//! Dispatcher metrics for observability

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Metrics for the dispatch worker
#[derive(Debug, Default)]
pub struct DispatcherMetrics {
    /// Batches waiting in the worker queue
    queue_len: AtomicUsize,
    /// Batches acknowledged by the destination
    succeeded: AtomicU64,
    /// Batches that exhausted the retry policy
    failed: AtomicU64,
    /// Write attempts, first tries included
    attempts: AtomicU64,
    /// Records acknowledged by the destination
    records_written: AtomicU64,
    /// Records in batches that exhausted the retry policy
    records_failed: AtomicU64,
    /// Times the circuit breaker opened
    breaker_opens: AtomicU64,
}

impl DispatcherMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_len(&self) -> usize {
        self.queue_len.load(Ordering::Relaxed)
    }

    pub fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    pub fn succeeded(&self) -> u64 {
        self.succeeded.load(Ordering::Relaxed)
    }

    pub fn inc_succeeded(&self, records: usize) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
        self.records_written
            .fetch_add(records as u64, Ordering::Relaxed);
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn inc_failed(&self, records: usize) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        self.records_failed
            .fetch_add(records as u64, Ordering::Relaxed);
    }

    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    pub fn inc_attempts(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_breaker_opens(&self) {
        self.breaker_opens.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DispatcherSnapshot {
        let succeeded = self.succeeded();
        let failed = self.failed();
        let attempts = self.attempts();
        DispatcherSnapshot {
            queue_len: self.queue_len(),
            succeeded,
            failed,
            attempts,
            retries: attempts.saturating_sub(succeeded + failed),
            records_written: self.records_written.load(Ordering::Relaxed),
            records_failed: self.records_failed.load(Ordering::Relaxed),
            breaker_opens: self.breaker_opens.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of dispatcher metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatcherSnapshot {
    pub queue_len: usize,
    pub succeeded: u64,
    pub failed: u64,
    pub attempts: u64,
    pub retries: u64,
    pub records_written: u64,
    pub records_failed: u64,
    pub breaker_opens: u64,
}
