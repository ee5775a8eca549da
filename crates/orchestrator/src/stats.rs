//! Pipeline statistics

use std::time::Duration;

use batcher::BatcherSnapshot;
use dispatcher::DispatcherSnapshot;
use ingestion::{IngestionSnapshot, StopReason};
use observability::DispatchStatsAggregator;

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Packets received / ignored / malformed, records decoded
    pub ingestion: IngestionSnapshot,

    /// Batches emitted by flush reason
    pub batcher: BatcherSnapshot,

    /// Dispatch attempts and results
    pub dispatcher: DispatcherSnapshot,

    /// Per-outcome batch size and latency distribution
    pub dispatch: DispatchStatsAggregator,

    /// Outcome packets handed to the sink
    pub outcomes_published: u64,

    /// Outcome packets the sink refused
    pub publish_errors: u64,

    /// Why ingestion stopped
    pub stop_reason: Option<StopReason>,

    /// Drain deadline hit; in-flight batches were abandoned
    pub drain_timed_out: bool,

    /// Batches closed by the batcher that never got an outcome
    pub abandoned_batches: u64,

    /// Records decoded that were neither written nor reported failed
    pub abandoned_records: u64,

    /// Total duration of the pipeline run
    pub duration: Duration,
}

impl PipelineStats {
    /// Fill the abandoned counters from the stage snapshots
    pub fn with_abandoned(mut self) -> Self {
        let settled = self.dispatcher.succeeded + self.dispatcher.failed;
        self.abandoned_batches = self.batcher.batches.saturating_sub(settled);
        let records_settled = self.dispatcher.records_written + self.dispatcher.records_failed;
        self.abandoned_records = self
            .ingestion
            .records_decoded
            .saturating_sub(records_settled);
        self
    }

    /// Records decoded per second
    pub fn records_per_sec(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.ingestion.records_decoded as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Share of dispatched batches that succeeded, as percentage
    pub fn success_rate(&self) -> f64 {
        let total = self.dispatcher.succeeded + self.dispatcher.failed;
        if total > 0 {
            (self.dispatcher.succeeded as f64 / total as f64) * 100.0
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Pipeline Statistics                       ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Records/s: {:.2}", self.records_per_sec());
        if let Some(reason) = self.stop_reason {
            println!("   ├─ Stopped: {reason:?}");
        }
        println!("   ├─ Drain timed out: {}", self.drain_timed_out);
        println!(
            "   └─ Abandoned: {} batches, {} records",
            self.abandoned_batches, self.abandoned_records
        );

        println!("\nIngestion");
        println!("   ├─ Packets received: {}", self.ingestion.packets_received);
        println!("   ├─ Packets ignored: {}", self.ingestion.packets_ignored);
        println!("   ├─ Decode errors: {}", self.ingestion.decode_errors);
        println!("   └─ Records decoded: {}", self.ingestion.records_decoded);

        println!("\nBatching");
        println!("   ├─ Batches: {}", self.batcher.batches);
        println!("   ├─ Count flushes: {}", self.batcher.count_flushes);
        println!("   ├─ Timer flushes: {}", self.batcher.timer_flushes);
        println!("   ├─ Shutdown flushes: {}", self.batcher.shutdown_flushes);
        println!("   └─ Empty windows: {}", self.batcher.empty_windows);

        println!("\nDispatch");
        println!(
            "   ├─ Batches: {} ok, {} failed ({:.2}% success)",
            self.dispatcher.succeeded,
            self.dispatcher.failed,
            self.success_rate()
        );
        println!("   ├─ Records written: {}", self.dispatcher.records_written);
        println!("   ├─ Records failed: {}", self.dispatcher.records_failed);
        println!("   ├─ Retries: {}", self.dispatcher.retries);
        println!("   ├─ Breaker opens: {}", self.dispatcher.breaker_opens);
        println!(
            "   └─ Outcomes published: {} ({} errors)",
            self.outcomes_published, self.publish_errors
        );

        let summary = self.dispatch.summary();
        if summary.batches > 0 {
            println!("\n{summary}");
        }

        println!();
    }
}
