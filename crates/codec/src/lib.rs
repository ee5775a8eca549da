//! # Codec
//!
//! Tagged binary packet format shared by producers, the subscription
//! transport and the outcome publisher.
//!
//! - [`Packet`]: primitive / node tree with typed accessors
//! - [`PacketCodec`]: tokio-util framing of packet streams
//! - [`varint`]: ULEB128 and zigzag helpers

pub mod error;
pub mod framing;
pub mod packet;
pub mod varint;

pub use error::CodecError;
pub use framing::{FramingError, PacketCodec};
pub use packet::{peek_header, Header, Packet, MAX_PACKET_SIZE, NODE_FLAG, TAG_ID_MASK};
