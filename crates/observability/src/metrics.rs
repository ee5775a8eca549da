//! Bridge metrics
//!
//! Thin wrappers over the `metrics` facade so every stage reports under the
//! same names, plus an in-memory aggregator for the end-of-run summary.

use contracts::{DispatchOutcome, FlushReason};
use metrics::{counter, gauge, histogram};

/// Packet read from the subscription
pub fn record_packet_received() {
    counter!("sensor_bridge_packets_received_total").increment(1);
}

/// Packet skipped because it carries another tag
pub fn record_packet_ignored(tag: u8) {
    counter!(
        "sensor_bridge_packets_ignored_total",
        "tag" => format!("{tag:#04x}")
    )
    .increment(1);
}

/// Packet dropped by the decoder
pub fn record_decode_error(kind: &'static str) {
    counter!("sensor_bridge_decode_errors_total", "kind" => kind).increment(1);
}

/// Record forwarded to the batcher
pub fn record_record_decoded() {
    counter!("sensor_bridge_records_decoded_total").increment(1);
}

/// Window closed into a batch
pub fn record_batch_emitted(reason: FlushReason, size: usize) {
    counter!("sensor_bridge_batches_emitted_total", "reason" => reason.as_str()).increment(1);
    histogram!("sensor_bridge_batch_size").record(size as f64);
}

/// Closed batches waiting for the dispatcher
pub fn record_pending_batches(depth: usize) {
    gauge!("sensor_bridge_pending_batches").set(depth as f64);
}

/// One write attempt against the destination
pub fn record_dispatch_attempt(appender: &str) {
    counter!(
        "sensor_bridge_dispatch_attempts_total",
        "appender" => appender.to_string()
    )
    .increment(1);
}

/// Final outcome of a batch
pub fn record_dispatch_outcome(appender: &str, outcome: &DispatchOutcome, latency_ms: f64) {
    let status = if outcome.success { "success" } else { "failure" };
    counter!(
        "sensor_bridge_dispatch_outcomes_total",
        "appender" => appender.to_string(),
        "status" => status
    )
    .increment(1);
    histogram!(
        "sensor_bridge_dispatch_latency_ms",
        "appender" => appender.to_string()
    )
    .record(latency_ms);
}

/// Circuit breaker state (1 = open)
pub fn record_breaker_open(appender: &str, open: bool) {
    gauge!(
        "sensor_bridge_breaker_open",
        "appender" => appender.to_string()
    )
    .set(if open { 1.0 } else { 0.0 });
}

/// Dispatch statistics aggregator
///
/// Aggregates outcomes in memory for the run summary.
#[derive(Debug, Clone, Default)]
pub struct DispatchStatsAggregator {
    pub batches: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub records_written: u64,
    pub records_failed: u64,
    /// Attempts beyond the first
    pub retries: u64,
    pub batch_size: RunningStats,
    pub latency_ms: RunningStats,
}

impl DispatchStatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, outcome: &DispatchOutcome, latency_ms: f64) {
        self.batches += 1;
        self.retries += u64::from(outcome.attempts.saturating_sub(1));
        if outcome.success {
            self.succeeded += 1;
            self.records_written += outcome.item_count as u64;
        } else {
            self.failed += 1;
            self.records_failed += outcome.item_count as u64;
        }
        self.batch_size.push(outcome.item_count as f64);
        self.latency_ms.push(latency_ms);
    }

    pub fn summary(&self) -> DispatchSummary {
        DispatchSummary {
            batches: self.batches,
            succeeded: self.succeeded,
            failed: self.failed,
            records_written: self.records_written,
            records_failed: self.records_failed,
            retries: self.retries,
            success_rate: if self.batches > 0 {
                self.succeeded as f64 / self.batches as f64 * 100.0
            } else {
                0.0
            },
            batch_size: StatsSummary::from(&self.batch_size),
            latency_ms: StatsSummary::from(&self.latency_ms),
        }
    }
}

/// Dispatch summary
#[derive(Debug, Clone, Default)]
pub struct DispatchSummary {
    pub batches: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub records_written: u64,
    pub records_failed: u64,
    pub retries: u64,
    pub success_rate: f64,
    pub batch_size: StatsSummary,
    pub latency_ms: StatsSummary,
}

impl std::fmt::Display for DispatchSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Dispatch Summary ===")?;
        writeln!(
            f,
            "Batches: {} ({} ok, {} failed, {:.2}% success)",
            self.batches, self.succeeded, self.failed, self.success_rate
        )?;
        writeln!(
            f,
            "Records: {} written, {} failed",
            self.records_written, self.records_failed
        )?;
        writeln!(f, "Retries: {}", self.retries)?;
        writeln!(f, "Batch size: {}", self.batch_size)?;
        writeln!(f, "Latency (ms): {}", self.latency_ms)?;
        Ok(())
    }
}

/// Statistics summary
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
