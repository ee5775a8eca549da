//! Ingestion stage
//!
//! Reads raw packets from a [`PacketSource`], keeps the subscribed tag,
//! decodes readings and forwards them to the batcher over a bounded channel.
//! A full channel stops the stage reading, which pushes back on the source.

use std::sync::Arc;

use async_channel::Sender;
use contracts::{PacketSource, RawPacket, SensorRecord};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, trace, warn};

use crate::decoder::RecordDecoder;
use crate::metrics::{IngestionMetrics, IngestionSnapshot};

/// Why the stage stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Source returned `None`
    SourceClosed,
    /// Cancellation token fired
    Cancelled,
    /// Batcher dropped its receiver
    DownstreamClosed,
}

/// Source → decoder → record channel
pub struct IngestionStage {
    decoder: RecordDecoder,
    metrics: Arc<IngestionMetrics>,
}

impl IngestionStage {
    pub fn new(tag: u8) -> Self {
        Self {
            decoder: RecordDecoder::new(tag),
            metrics: Arc::new(IngestionMetrics::new()),
        }
    }

    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn snapshot(&self) -> IngestionSnapshot {
        self.metrics.snapshot()
    }

    /// Run until the source ends, `cancel` fires or the batcher goes away
    ///
    /// Dropping `tx` on return closes the record channel, which is the
    /// batcher's shutdown signal.
    #[instrument(
        name = "ingestion_stage",
        skip(self, source, tx, cancel),
        fields(source = %source.name(), tag = self.decoder.tag())
    )]
    pub async fn run<S: PacketSource>(
        &self,
        mut source: S,
        tx: Sender<SensorRecord>,
        cancel: CancellationToken,
    ) -> StopReason {
        info!("ingestion started");

        let reason = loop {
            let packet = tokio::select! {
                biased;
                _ = cancel.cancelled() => break StopReason::Cancelled,
                packet = source.next_packet() => match packet {
                    Some(packet) => packet,
                    None => break StopReason::SourceClosed,
                },
            };

            if let Some(record) = self.process(packet) {
                // Already-decoded records are not dropped on cancellation
                if tx.send(record).await.is_err() {
                    break StopReason::DownstreamClosed;
                }
            }
        };

        let snapshot = self.metrics.snapshot();
        info!(
            ?reason,
            received = snapshot.packets_received,
            ignored = snapshot.packets_ignored,
            decode_errors = snapshot.decode_errors,
            records = snapshot.records_decoded,
            "ingestion stopped"
        );
        reason
    }

    fn process(&self, packet: RawPacket) -> Option<SensorRecord> {
        self.metrics.record_received();
        observability::record_packet_received();

        if packet.tag != self.decoder.tag() {
            self.metrics.record_ignored();
            observability::record_packet_ignored(packet.tag);
            trace!(tag = packet.tag, "ignoring packet on other tag");
            return None;
        }

        match self.decoder.decode_frame(&packet.frame) {
            Ok(record) => {
                self.metrics.record_decoded();
                observability::record_record_decoded();
                Some(record)
            }
            Err(e) => {
                self.metrics.record_decode_error();
                observability::record_decode_error(e.kind());
                warn!(
                    error = %e,
                    field = e.field().unwrap_or("-"),
                    len = packet.len(),
                    "dropping undecodable packet"
                );
                None
            }
        }
    }
}
