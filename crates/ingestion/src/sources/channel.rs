//! In-process channel transport
//!
//! Lets the pipeline run embedded inside another service, or inside tests,
//! without a socket.

use contracts::{ContractError, PacketSink, PacketSource, RawPacket};
use tokio::sync::mpsc;

/// Packet source backed by an mpsc receiver
pub struct ChannelSource {
    name: String,
    rx: mpsc::Receiver<RawPacket>,
}

impl ChannelSource {
    pub fn new(name: impl Into<String>, rx: mpsc::Receiver<RawPacket>) -> Self {
        Self {
            name: name.into(),
            rx,
        }
    }

    /// Source plus the sender feeding it
    pub fn pair(name: impl Into<String>, capacity: usize) -> (mpsc::Sender<RawPacket>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self::new(name, rx))
    }
}

impl PacketSource for ChannelSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next_packet(&mut self) -> Option<RawPacket> {
        self.rx.recv().await
    }
}

/// Packet sink backed by an mpsc sender
#[derive(Clone)]
pub struct ChannelSink {
    name: String,
    tx: mpsc::Sender<RawPacket>,
}

impl ChannelSink {
    pub fn new(name: impl Into<String>, tx: mpsc::Sender<RawPacket>) -> Self {
        Self {
            name: name.into(),
            tx,
        }
    }

    /// Sink plus the receiver draining it
    pub fn pair(name: impl Into<String>, capacity: usize) -> (Self, mpsc::Receiver<RawPacket>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(name, tx), rx)
    }
}

impl PacketSink for ChannelSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn publish(&mut self, packet: RawPacket) -> Result<(), ContractError> {
        self.tx
            .send(packet)
            .await
            .map_err(|_| ContractError::sink_write(&self.name, "output channel closed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_sink_closed() {
        let (mut sink, rx) = ChannelSink::pair("out", 1);
        drop(rx);
        let err = sink.publish(RawPacket::new(0x10, vec![0x10, 0x00])).await;
        assert!(matches!(err, Err(ContractError::SinkWrite { .. })));
    }

    #[tokio::test]
    async fn test_channel_source_ends_with_sender() {
        let (tx, mut source) = ChannelSource::pair("in", 1);
        tx.send(RawPacket::new(0x10, vec![0x10, 0x00])).await.unwrap();
        drop(tx);
        assert!(source.next_packet().await.is_some());
        assert!(source.next_packet().await.is_none());
    }
}
