//! RawPacket - subscription transport unit

use bytes::Bytes;

/// Opaque tagged packet as delivered by (or handed to) the subscription layer
///
/// `frame` holds the complete encoded packet, header included. `tag` is the
/// packet's top-level tag, peeked by the transport so the subscription can
/// route without decoding the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPacket {
    /// Top-level tag identifier
    pub tag: u8,

    /// Full encoded packet (zero-copy)
    pub frame: Bytes,
}

impl RawPacket {
    pub fn new(tag: u8, frame: impl Into<Bytes>) -> Self {
        Self {
            tag,
            frame: frame.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.frame.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.is_empty()
    }
}
