//! # Ingestion
//!
//! Packet subscription and record decoding.
//!
//! Responsibilities:
//! - Receive tagged packets (TCP producers, in-process channels, mock source)
//! - Keep the subscribed tag, count and skip the rest
//! - Decode readings into `SensorRecord`, drop and count malformed packets
//! - Forward records downstream over a bounded async-channel
//!
//! ```ignore
//! use ingestion::{IngestionStage, TcpPacketServer};
//!
//! let mut server = TcpPacketServer::bind("0.0.0.0:9140", 1024).await?;
//! let source = server.take_source().expect("fresh server");
//! let (tx, rx) = async_channel::bounded(1024);
//! let stage = IngestionStage::new(0x10);
//! stage.run(source, tx, cancel).await;
//! server.shutdown();
//! ```

mod decoder;
mod error;
mod metrics;
mod stage;
pub mod sources;

pub use decoder::{encode_record, RecordDecoder, FROM_TAG, NOISE_TAG, TIME_TAG};
pub use error::{DecodeError, Result};
pub use metrics::{IngestionMetrics, IngestionSnapshot};
pub use sources::{
    BroadcastSink, ChannelSink, ChannelSource, MockNoiseConfig, MockNoiseSource, TcpPacketServer,
    TcpPacketSource,
};
pub use stage::{IngestionStage, StopReason};
