//! Batcher actor task
//!
//! Owns the [`WindowedBatcher`]; the window timer is a `select!` branch of the
//! same task, so the window state has exactly one writer.
//!
//! Closed batches queue in a bounded pending list until the dispatcher takes
//! them. While that list is full the task stops receiving records, so
//! backpressure travels up the record channel to ingestion.

use std::collections::VecDeque;
use std::sync::Arc;

use async_channel::Receiver;
use contracts::{Batch, BatchConfig, FlushReason, SensorRecord};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, instrument, warn};

use crate::metrics::{BatcherMetrics, BatcherSnapshot};
use crate::window::WindowedBatcher;

/// Windowed batching stage
pub struct Batcher {
    config: BatchConfig,
    metrics: Arc<BatcherMetrics>,
}

impl Batcher {
    pub fn new(config: BatchConfig) -> Self {
        Self {
            config,
            metrics: Arc::new(BatcherMetrics::new()),
        }
    }

    pub fn metrics(&self) -> Arc<BatcherMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Run on a new task
    pub fn spawn(
        self,
        rx: Receiver<SensorRecord>,
        tx: mpsc::Sender<Batch>,
    ) -> JoinHandle<BatcherSnapshot> {
        tokio::spawn(self.run(rx, tx))
    }

    /// Run until the record channel closes and every batch is handed off
    ///
    /// On input close the partial window is flushed with
    /// [`FlushReason::Shutdown`]. Dropping `tx` on return tells the dispatcher
    /// no more batches follow.
    #[instrument(
        name = "batcher_loop",
        skip_all,
        fields(
            max_batch_size = self.config.max_batch_size,
            max_window_ms = self.config.max_window_ms,
            anchor = ?self.config.window_anchor
        )
    )]
    pub async fn run(self, rx: Receiver<SensorRecord>, tx: mpsc::Sender<Batch>) -> BatcherSnapshot {
        let max_pending = self.config.max_pending_batches.max(1);
        let mut window = WindowedBatcher::new(&self.config, Instant::now());
        let mut pending: VecDeque<Batch> = VecDeque::with_capacity(max_pending + 1);
        let mut input_open = true;

        info!("batcher started");

        loop {
            if !input_open && pending.is_empty() {
                break;
            }

            tokio::select! {
                biased;

                permit = tx.reserve(), if !pending.is_empty() => match permit {
                    Ok(permit) => {
                        if let Some(batch) = pending.pop_front() {
                            debug!(seq = batch.sequence, "batch handed to dispatcher");
                            permit.send(batch);
                        }
                        self.set_pending(pending.len());
                    }
                    Err(_) => {
                        warn!(dropped = pending.len(), "dispatcher gone, discarding pending batches");
                        pending.clear();
                        self.set_pending(0);
                        break;
                    }
                },

                _ = sleep_until(window.deadline()), if input_open => {
                    match window.on_deadline(Instant::now()) {
                        Some(batch) => self.enqueue(&mut pending, batch),
                        None => self.metrics.inc_empty_windows(),
                    }
                }

                record = rx.recv(), if input_open && pending.len() < max_pending => match record {
                    Ok(record) => {
                        self.metrics.inc_records();
                        if let Some(batch) = window.push(record, Instant::now()) {
                            self.enqueue(&mut pending, batch);
                        }
                    }
                    Err(_) => {
                        input_open = false;
                        debug!(buffered = window.len(), "record channel closed");
                        if let Some(batch) = window.flush(FlushReason::Shutdown, Instant::now()) {
                            self.enqueue(&mut pending, batch);
                        }
                    }
                },
            }
        }

        let snapshot = self.metrics.snapshot();
        info!(
            records = snapshot.records,
            batches = snapshot.batches,
            count = snapshot.count_flushes,
            timer = snapshot.timer_flushes,
            shutdown = snapshot.shutdown_flushes,
            "batcher stopped"
        );
        snapshot
    }

    fn enqueue(&self, pending: &mut VecDeque<Batch>, batch: Batch) {
        self.metrics.inc_flush(batch.reason);
        observability::record_batch_emitted(batch.reason, batch.len());
        debug!(
            seq = batch.sequence,
            size = batch.len(),
            reason = batch.reason.as_str(),
            "window closed"
        );
        pending.push_back(batch);
        self.set_pending(pending.len());
    }

    fn set_pending(&self, depth: usize) {
        self.metrics.set_pending(depth);
        observability::record_pending_batches(depth);
    }
}
