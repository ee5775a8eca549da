//! PacketSource / PacketSink traits - subscription layer abstraction
//!
//! Decouples the pipeline from the concrete subscription transport
//! (TCP listener, in-process channels, mock generators).

use crate::{ContractError, RawPacket};

/// Inbound packet stream
#[trait_variant::make(PacketSource: Send)]
pub trait LocalPacketSource {
    /// Source name (used for logging)
    fn name(&self) -> &str;

    /// Wait for the next packet
    ///
    /// Returns `None` once the source is exhausted or closed.
    async fn next_packet(&mut self) -> Option<RawPacket>;
}

/// Outbound packet sink
#[trait_variant::make(PacketSink: Send)]
pub trait LocalPacketSink {
    /// Sink name (used for logging)
    fn name(&self) -> &str;

    /// Publish one packet
    async fn publish(&mut self, packet: RawPacket) -> Result<(), ContractError>;
}
