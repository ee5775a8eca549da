//! Record decoder
//!
//! A sensor reading travels as a node packet on the subscribed tag:
//!
//! | Child tag | Field | Type |
//! |-----------|-------|------|
//! | `0x11` | noise | float32 |
//! | `0x12` | time | int64 (unix ms) |
//! | `0x13` | from | utf8 |
//!
//! Unknown children are ignored; when a field repeats the first one wins.

use bytes::Bytes;
use codec::{CodecError, Packet};
use contracts::{SensorRecord, DEFAULT_TAG};

use crate::error::{DecodeError, Result};

pub const NOISE_TAG: u8 = 0x11;
pub const TIME_TAG: u8 = 0x12;
pub const FROM_TAG: u8 = 0x13;

/// Pure packet → record decoder
#[derive(Debug, Clone, Copy)]
pub struct RecordDecoder {
    tag: u8,
}

impl Default for RecordDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_TAG)
    }
}

impl RecordDecoder {
    pub fn new(tag: u8) -> Self {
        Self { tag }
    }

    pub fn tag(&self) -> u8 {
        self.tag
    }

    /// Decode one complete packet
    pub fn decode(&self, raw: &[u8]) -> Result<SensorRecord> {
        self.decode_frame(&Bytes::copy_from_slice(raw))
    }

    /// Zero-copy variant of [`decode`](Self::decode) for frames off the wire
    pub fn decode_frame(&self, frame: &Bytes) -> Result<SensorRecord> {
        let packet = Packet::decode(frame).map_err(DecodeError::Malformed)?;

        if packet.tag() != self.tag {
            return Err(DecodeError::TagMismatch {
                expected: self.tag,
                actual: packet.tag(),
            });
        }
        if !packet.is_node() {
            return Err(DecodeError::NotANode { tag: packet.tag() });
        }

        let noise = field(&packet, NOISE_TAG, "noise")?
            .as_f32()
            .map_err(invalid("noise"))?;
        let timestamp_millis = field(&packet, TIME_TAG, "time")?
            .as_i64()
            .map_err(invalid("time"))?;
        let source = field(&packet, FROM_TAG, "from")?
            .as_str()
            .map_err(invalid("from"))?;

        Ok(SensorRecord::new(noise, timestamp_millis, source))
    }
}

fn field<'a>(packet: &'a Packet, tag: u8, name: &'static str) -> Result<&'a Packet> {
    packet
        .child(tag)
        .ok_or(DecodeError::MissingField { field: name })
}

fn invalid(field: &'static str) -> impl Fn(CodecError) -> DecodeError {
    move |source| DecodeError::InvalidField { field, source }
}

/// Encode `record` as a reading packet on `tag`
///
/// Inverse of [`RecordDecoder::decode`]; used by the mock source and by
/// producers embedded in tests.
pub fn encode_record(tag: u8, record: &SensorRecord) -> std::result::Result<Bytes, CodecError> {
    Packet::node(
        tag,
        vec![
            Packet::float32(NOISE_TAG, record.noise),
            Packet::int64(TIME_TAG, record.timestamp_millis),
            Packet::utf8(FROM_TAG, &record.source),
        ],
    )
    .to_bytes()
}
