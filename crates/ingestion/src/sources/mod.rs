//! Subscription transports

mod channel;
mod mock;
mod tcp;

pub use channel::{ChannelSink, ChannelSource};
pub use mock::{MockNoiseConfig, MockNoiseSource};
pub use tcp::{BroadcastSink, TcpPacketServer, TcpPacketSource};
