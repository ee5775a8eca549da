//! Pipeline orchestrator - wires ingestion, batching and dispatch
//!
//! ```text
//! source ─▶ IngestionStage ─(records)─▶ Batcher ─(batches)─▶ Dispatcher
//!                                                               │
//!  sink ◀──────────────── outcome packets ◀──────(outcomes)─────┘
//! ```
//!
//! Shutdown runs front to back: ingestion stops, the batcher flushes its
//! partial window once the record channel closes, the dispatcher drains, and
//! the last outcome is published. The whole drain, ingestion included, is
//! bounded by `drain_timeout` counted from cancellation; whatever is still in
//! flight at the deadline is aborted and reported as abandoned.

use std::time::Instant;

use batcher::Batcher;
use contracts::{
    BridgeConfig, ContractError, DispatchOutcome, LogAppender, PacketSink, PacketSource,
};
use dispatcher::{Dispatcher, DispatcherError, DispatcherHandle};
use ingestion::{IngestionStage, StopReason};
use observability::DispatchStatsAggregator;
use tokio::sync::mpsc;
use tokio::time::{timeout_at, Instant as Deadline};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::PipelineError;
use crate::outcome::encode_outcome;
use crate::stats::PipelineStats;

/// Closed batches queued in front of the dispatcher (the batcher keeps its
/// own pending queue)
const DISPATCH_QUEUE: usize = 1;

/// Outcomes buffered in front of the sink
const OUTCOME_QUEUE: usize = 16;

/// Main pipeline orchestrator
pub struct Pipeline {
    config: BridgeConfig,
}

impl Pipeline {
    /// Create a new pipeline from a validated configuration
    pub fn new(config: BridgeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Run until `source` ends, `shutdown` fires or dispatch escalates
    ///
    /// # Errors
    /// - `Startup` when the destination probe fails
    /// - `Aborted` after the consecutive-failure escalation (drained first)
    /// - `Task` when a stage panics
    #[instrument(
        name = "pipeline_run",
        skip_all,
        fields(
            transport = self.config.destination.transport.as_str(),
            topic = %self.config.destination.topic,
            tag = self.config.subscription.tag
        )
    )]
    pub async fn run<S, K, A>(
        &self,
        source: S,
        sink: K,
        mut appender: A,
        shutdown: CancellationToken,
    ) -> Result<PipelineStats, PipelineError>
    where
        S: PacketSource + 'static,
        K: PacketSink + 'static,
        A: LogAppender + 'static,
    {
        let start_time = Instant::now();
        let config = &self.config;
        let tag = config.subscription.tag;

        if config.destination.probe_on_startup {
            probe(&mut appender).await?;
        }

        let (record_tx, record_rx) =
            async_channel::bounded(config.subscription.channel_capacity.max(1));
        let (batch_tx, batch_rx) = mpsc::channel(DISPATCH_QUEUE);
        let (outcome_tx, outcome_rx) = mpsc::channel(OUTCOME_QUEUE);

        // Cancelled by the caller or by dispatch escalation
        let stop_ingestion = shutdown.child_token();

        let stage = IngestionStage::new(tag);
        let ingestion_metrics = stage.metrics();
        let ingestion_cancel = stop_ingestion.clone();
        let mut ingestion_task =
            tokio::spawn(async move { stage.run(source, record_tx, ingestion_cancel).await });

        let batcher = Batcher::new(config.batch.clone());
        let batcher_metrics = batcher.metrics();
        let mut batcher_task = batcher.spawn(record_rx, batch_tx);

        let dispatcher = Dispatcher::new(appender, config).with_escalation(
            config.lifecycle.max_consecutive_failures,
            stop_ingestion.clone(),
        );
        let mut dispatch = DispatcherHandle::spawn(dispatcher, batch_rx, outcome_tx);

        let publisher_task = tokio::spawn(publish_outcomes(sink, outcome_rx, tag));

        info!(
            max_batch_size = config.batch.max_batch_size,
            max_window_ms = config.batch.max_window_ms,
            endpoint = %config.destination.endpoint,
            "Pipeline running"
        );

        // The drain deadline starts at cancellation, or when ingestion ends on its own
        let drain_timeout = config.lifecycle.drain_timeout();
        let (stop_reason, deadline, ingestion_stuck) = tokio::select! {
            joined = &mut ingestion_task => {
                let reason = joined.map_err(|e| PipelineError::task("ingestion", e))?;
                (reason, Deadline::now() + drain_timeout, false)
            }
            _ = stop_ingestion.cancelled() => {
                let deadline = Deadline::now() + drain_timeout;
                match timeout_at(deadline, &mut ingestion_task).await {
                    Ok(joined) => {
                        let reason = joined.map_err(|e| PipelineError::task("ingestion", e))?;
                        (reason, deadline, false)
                    }
                    Err(_) => {
                        warn!(
                            drain_timeout_ms = drain_timeout.as_millis() as u64,
                            "Ingestion blocked past drain deadline, aborting"
                        );
                        ingestion_task.abort();
                        (StopReason::Cancelled, deadline, true)
                    }
                }
            }
        };

        info!(?stop_reason, "Ingestion stopped, draining");
        let drained = timeout_at(deadline, async {
            let batcher_result = (&mut batcher_task).await;
            let dispatch_result = dispatch.join().await;
            (batcher_result, dispatch_result)
        })
        .await;

        let (drain_timed_out, dispatch_result) = match drained {
            Ok((batcher_result, dispatch_result)) => {
                batcher_result.map_err(|e| PipelineError::task("batcher", e))?;
                (ingestion_stuck, dispatch_result)
            }
            Err(_) => {
                warn!(
                    drain_timeout_ms = drain_timeout.as_millis() as u64,
                    "Drain timed out, abandoning in-flight batches"
                );
                batcher_task.abort();
                dispatch.abort();
                (true, Ok(dispatch.metrics().snapshot()))
            }
        };

        let published = publisher_task
            .await
            .map_err(|e| PipelineError::task("publisher", e))?;

        let stats = PipelineStats {
            ingestion: ingestion_metrics.snapshot(),
            batcher: batcher_metrics.snapshot(),
            dispatcher: dispatch.metrics().snapshot(),
            dispatch: published.dispatch,
            outcomes_published: published.published,
            publish_errors: published.errors,
            stop_reason: Some(stop_reason),
            drain_timed_out,
            abandoned_batches: 0,
            abandoned_records: 0,
            duration: start_time.elapsed(),
        }
        .with_abandoned();

        if stats.abandoned_batches > 0 || stats.abandoned_records > 0 {
            warn!(
                drain_timed_out,
                abandoned_batches = stats.abandoned_batches,
                abandoned_records = stats.abandoned_records,
                "Records decoded but never dispatched"
            );
        }

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            records = stats.ingestion.records_decoded,
            batches = stats.batcher.batches,
            succeeded = stats.dispatcher.succeeded,
            failed = stats.dispatcher.failed,
            drain_timed_out,
            "Pipeline shutdown complete"
        );

        match dispatch_result {
            Ok(_) => Ok(stats),
            Err(DispatcherError::Worker(message)) => Err(PipelineError::Task {
                stage: "dispatcher",
                message,
            }),
            Err(source) => Err(PipelineError::Aborted {
                stats: Box::new(stats),
                source,
            }),
        }
    }
}

/// Check the destination once before consuming anything
#[instrument(name = "pipeline_probe", skip_all, fields(endpoint = %appender.endpoint()))]
async fn probe<A: LogAppender>(appender: &mut A) -> Result<(), PipelineError> {
    match appender.probe().await {
        Ok(()) => {
            info!(appender = %appender.name(), "Destination reachable");
            Ok(())
        }
        Err(e) => Err(PipelineError::Startup(
            ContractError::DestinationUnreachable {
                endpoint: appender.endpoint().to_string(),
                message: e.to_string(),
            },
        )),
    }
}

#[derive(Debug, Default)]
struct PublishReport {
    published: u64,
    errors: u64,
    dispatch: DispatchStatsAggregator,
}

/// Re-emit every outcome as a packet on `tag`
#[instrument(name = "outcome_publisher", skip_all, fields(sink = %sink.name()))]
async fn publish_outcomes<K: PacketSink>(
    mut sink: K,
    mut rx: mpsc::Receiver<DispatchOutcome>,
    tag: u8,
) -> PublishReport {
    let mut report = PublishReport::default();

    while let Some(outcome) = rx.recv().await {
        report.dispatch.update(&outcome, outcome.latency_ms as f64);
        info!(
            seq = outcome.batch_sequence,
            success = outcome.success,
            items = outcome.item_count,
            attempts = outcome.attempts,
            "{}",
            outcome.summary()
        );

        let packet = match encode_outcome(tag, &outcome) {
            Ok(packet) => packet,
            Err(e) => {
                warn!(seq = outcome.batch_sequence, error = %e, "Outcome encode failed");
                report.errors += 1;
                continue;
            }
        };

        match sink.publish(packet).await {
            Ok(()) => report.published += 1,
            Err(e) => {
                warn!(seq = outcome.batch_sequence, error = %e, "Outcome publish failed");
                report.errors += 1;
            }
        }
    }

    debug!(published = report.published, "Outcome publisher stopped");
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::decode_outcome;
    use contracts::{AppendAck, Batch, SensorRecord, TransportKind};
    use ingestion::{encode_record, ChannelSink, ChannelSource};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Records every batch; fails the first `fail_first` appends
    #[derive(Clone, Default)]
    struct RecordingAppender {
        batches: Arc<Mutex<Vec<Batch>>>,
        calls: Arc<AtomicU32>,
        fail_first: u32,
        unreachable: bool,
    }

    impl LogAppender for RecordingAppender {
        fn name(&self) -> &str {
            "recording"
        }

        fn endpoint(&self) -> &str {
            "mock://log"
        }

        async fn probe(&mut self) -> Result<(), ContractError> {
            if self.unreachable {
                return Err(ContractError::transport("recording", "mock://log", "refused"));
            }
            Ok(())
        }

        async fn append(&mut self, batch: &Batch) -> Result<AppendAck, ContractError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.fail_first {
                return Err(ContractError::rejected("recording", 503, "unavailable"));
            }
            self.batches.lock().unwrap().push(batch.clone());
            Ok(AppendAck::new("ok"))
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            Ok(())
        }
    }

    /// Accepts the connection, never completes an append
    struct StuckAppender;

    impl LogAppender for StuckAppender {
        fn name(&self) -> &str {
            "stuck"
        }

        fn endpoint(&self) -> &str {
            "mock://stuck"
        }

        async fn probe(&mut self) -> Result<(), ContractError> {
            Ok(())
        }

        async fn append(&mut self, _batch: &Batch) -> Result<AppendAck, ContractError> {
            std::future::pending().await
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            Ok(())
        }
    }

    fn config(max_batch_size: usize, max_window_ms: u64) -> BridgeConfig {
        let mut config = BridgeConfig::default();
        config.destination.transport = TransportKind::Log;
        config.batch.max_batch_size = max_batch_size;
        config.batch.max_window_ms = max_window_ms;
        config.retry.initial_backoff_ms = 10;
        config
    }

    fn reading(i: i64) -> contracts::RawPacket {
        let record = SensorRecord::new(i as f32, i, "mic");
        contracts::RawPacket::new(0x10, encode_record(0x10, &record).unwrap())
    }

    #[tokio::test(start_paused = true)]
    async fn test_records_flow_to_outcomes() {
        let (packet_tx, source) = ChannelSource::pair("test", 16);
        let (sink, mut outcome_rx) = ChannelSink::pair("out", 16);
        let appender = RecordingAppender::default();

        for i in 0..5 {
            packet_tx.send(reading(i)).await.unwrap();
        }
        // Malformed and foreign-tag packets are dropped without disturbing the window
        packet_tx
            .send(contracts::RawPacket::new(0x10, vec![0x90, 0x05, 0x11]))
            .await
            .unwrap();
        packet_tx
            .send(contracts::RawPacket::new(0x20, vec![0x20, 0x00]))
            .await
            .unwrap();
        drop(packet_tx);

        let stats = Pipeline::new(config(2, 1_000))
            .run(source, sink, appender.clone(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(stats.ingestion.packets_received, 7);
        assert_eq!(stats.ingestion.decode_errors, 1);
        assert_eq!(stats.ingestion.packets_ignored, 1);
        assert_eq!(stats.ingestion.records_decoded, 5);
        assert_eq!(stats.batcher.batches, 3);
        assert_eq!(stats.dispatcher.succeeded, 3);
        assert_eq!(stats.outcomes_published, 3);

        let batches = appender.batches.lock().unwrap().clone();
        let times: Vec<i64> = batches
            .iter()
            .flat_map(|b| b.records.iter().map(|r| r.timestamp_millis))
            .collect();
        assert_eq!(times, vec![0, 1, 2, 3, 4]);

        let mut sequences = Vec::new();
        while let Some(packet) = outcome_rx.recv().await {
            let message = decode_outcome(&packet).unwrap();
            assert!(message.outcome.success);
            sequences.push(message.outcome.batch_sequence);
        }
        assert_eq!(sequences, vec![1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_failure_is_startup_error() {
        let (_packet_tx, source) = ChannelSource::pair("test", 1);
        let (sink, _outcome_rx) = ChannelSink::pair("out", 1);
        let appender = RecordingAppender {
            unreachable: true,
            ..Default::default()
        };

        let err = Pipeline::new(config(2, 1_000))
            .run(source, sink, appender.clone(), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Startup(ContractError::DestinationUnreachable { .. })
        ));
        assert_eq!(appender.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_flushes_partial_window() {
        let (packet_tx, source) = ChannelSource::pair("test", 16);
        let (sink, mut outcome_rx) = ChannelSink::pair("out", 16);
        let appender = RecordingAppender::default();
        let shutdown = CancellationToken::new();

        packet_tx.send(reading(1)).await.unwrap();
        packet_tx.send(reading(2)).await.unwrap();

        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let stats = Pipeline::new(config(10, 60_000))
            .run(source, sink, appender.clone(), shutdown)
            .await
            .unwrap();

        assert_eq!(stats.stop_reason, Some(ingestion::StopReason::Cancelled));
        assert_eq!(stats.batcher.shutdown_flushes, 1);
        assert_eq!(appender.batches.lock().unwrap()[0].len(), 2);
        let message = decode_outcome(&outcome_rx.recv().await.unwrap()).unwrap();
        assert_eq!(message.outcome.item_count, 2);
        drop(packet_tx);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_yields_single_success_outcome() {
        let (packet_tx, source) = ChannelSource::pair("test", 4);
        let (sink, mut outcome_rx) = ChannelSink::pair("out", 4);
        let appender = RecordingAppender {
            fail_first: 1,
            ..Default::default()
        };

        packet_tx.send(reading(1)).await.unwrap();
        drop(packet_tx);

        let stats = Pipeline::new(config(1, 1_000))
            .run(source, sink, appender, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(stats.dispatcher.retries, 1);

        let message = decode_outcome(&outcome_rx.recv().await.unwrap()).unwrap();
        assert!(message.outcome.success);
        assert_eq!(message.outcome.attempts, 2);
        assert!(outcome_rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_escalation_aborts_after_drain() {
        let (packet_tx, source) = ChannelSource::pair("test", 8);
        let (sink, mut outcome_rx) = ChannelSink::pair("out", 8);
        let appender = RecordingAppender {
            fail_first: u32::MAX,
            ..Default::default()
        };
        let mut config = config(1, 1_000);
        config.retry.max_attempts = 1;
        config.breaker.failure_threshold = 0;
        config.lifecycle.max_consecutive_failures = 2;

        for i in 0..2 {
            packet_tx.send(reading(i)).await.unwrap();
        }

        let err = Pipeline::new(config)
            .run(source, sink, appender, CancellationToken::new())
            .await
            .unwrap_err();
        let PipelineError::Aborted { stats, .. } = err else {
            panic!("expected escalation, got {err:?}");
        };
        assert_eq!(stats.stop_reason, Some(ingestion::StopReason::Cancelled));
        assert_eq!(stats.dispatcher.failed, 2);

        let mut failed = 0;
        while let Some(packet) = outcome_rx.recv().await {
            assert!(!decode_outcome(&packet).unwrap().outcome.success);
            failed += 1;
        }
        assert_eq!(failed, 2);
        drop(packet_tx);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_deadline_bounds_blocked_ingestion() {
        let (packet_tx, source) = ChannelSource::pair("test", 16);
        let (sink, mut outcome_rx) = ChannelSink::pair("out", 16);
        let mut config = config(1, 60_000);
        config.subscription.channel_capacity = 1;
        config.batch.max_pending_batches = 1;
        config.lifecycle.drain_timeout_ms = 200;

        // Enough readings to back up every queue behind the stuck append
        for i in 0..10 {
            packet_tx.send(reading(i)).await.unwrap();
        }

        let shutdown = CancellationToken::new();
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = Deadline::now();
        let stats = Pipeline::new(config)
            .run(source, sink, StuckAppender, shutdown)
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(stats.drain_timed_out);
        assert_eq!(stats.stop_reason, Some(ingestion::StopReason::Cancelled));
        assert_eq!(stats.dispatcher.succeeded + stats.dispatcher.failed, 0);
        assert!(stats.batcher.batches > 0);
        assert_eq!(stats.abandoned_batches, stats.batcher.batches);
        assert_eq!(stats.abandoned_records, stats.ingestion.records_decoded);
        assert!(outcome_rx.recv().await.is_none());
        drop(packet_tx);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clean_drain_abandons_nothing() {
        let (packet_tx, source) = ChannelSource::pair("test", 8);
        let (sink, _outcome_rx) = ChannelSink::pair("out", 8);
        for i in 0..4 {
            packet_tx.send(reading(i)).await.unwrap();
        }
        drop(packet_tx);

        let stats = Pipeline::new(config(3, 1_000))
            .run(source, sink, RecordingAppender::default(), CancellationToken::new())
            .await
            .unwrap();
        assert!(!stats.drain_timed_out);
        assert_eq!(stats.abandoned_batches, 0);
        assert_eq!(stats.abandoned_records, 0);
    }
}
