//! Ingestion stage metrics

use std::sync::atomic::{AtomicU64, Ordering};

/// Ingestion counters, shared between the stage task and observers
#[derive(Debug, Default)]
pub struct IngestionMetrics {
    /// Packets read from the source (any tag)
    pub packets_received: AtomicU64,

    /// Packets skipped because of their tag
    pub packets_ignored: AtomicU64,

    /// Packets dropped by the decoder
    pub decode_errors: AtomicU64,

    /// Records forwarded to the batcher
    pub records_decoded: AtomicU64,
}

impl IngestionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self) {
        self.packets_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ignored(&self) {
        self.packets_ignored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decoded(&self) {
        self.records_decoded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> IngestionSnapshot {
        IngestionSnapshot {
            packets_received: self.packets_received.load(Ordering::Relaxed),
            packets_ignored: self.packets_ignored.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            records_decoded: self.records_decoded.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`IngestionMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestionSnapshot {
    pub packets_received: u64,
    pub packets_ignored: u64,
    pub decode_errors: u64,
    pub records_decoded: u64,
}
