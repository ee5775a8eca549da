//! Log-append wire protocol
//!
//! Every message is a 4-byte big-endian length-prefixed frame (handled by
//! `LengthDelimitedCodec`). Frame payloads:
//!
//! ```text
//! request:  u8 opcode (0x01) | u16 topic_len | topic | u32 partition
//!           | u32 count | count x (u32 len | bytes)
//! response: u8 status = 0x00 | u64 base_offset            (ack)
//!           u8 status != 0x00 | u16 msg_len | msg          (nack)
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;
use tokio_util::codec::LengthDelimitedCodec;

pub const OP_APPEND: u8 = 0x01;
pub const STATUS_ACK: u8 = 0x00;

/// Largest frame either side accepts
pub const MAX_FRAME_LENGTH: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("frame truncated while reading {0}")]
    Truncated(&'static str),

    #[error("unknown opcode {0:#04x}")]
    UnknownOpcode(u8),

    #[error("{field} of {len} bytes exceeds wire limit")]
    TooLong { field: &'static str, len: usize },

    #[error("{0} is not valid UTF-8")]
    InvalidUtf8(&'static str),

    #[error("{0} trailing bytes after message")]
    TrailingBytes(usize),
}

/// Length-prefixed framing shared by client and server
pub fn frame_codec() -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .length_field_length(4)
        .max_frame_length(MAX_FRAME_LENGTH)
        .big_endian()
        .new_codec()
}

/// Append request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendRequest {
    pub topic: String,
    pub partition: u32,
    pub records: Vec<Bytes>,
}

impl AppendRequest {
    pub fn encode(&self) -> Result<Bytes, ProtocolError> {
        let topic_len = u16::try_from(self.topic.len()).map_err(|_| ProtocolError::TooLong {
            field: "topic",
            len: self.topic.len(),
        })?;
        let count = u32::try_from(self.records.len()).map_err(|_| ProtocolError::TooLong {
            field: "record count",
            len: self.records.len(),
        })?;

        let body: usize = self.records.iter().map(|r| 4 + r.len()).sum();
        let mut dst = BytesMut::with_capacity(1 + 2 + self.topic.len() + 4 + 4 + body);
        dst.put_u8(OP_APPEND);
        dst.put_u16(topic_len);
        dst.put_slice(self.topic.as_bytes());
        dst.put_u32(self.partition);
        dst.put_u32(count);
        for record in &self.records {
            let len = u32::try_from(record.len()).map_err(|_| ProtocolError::TooLong {
                field: "record",
                len: record.len(),
            })?;
            dst.put_u32(len);
            dst.put_slice(record);
        }
        Ok(dst.freeze())
    }

    pub fn decode(mut src: Bytes) -> Result<Self, ProtocolError> {
        let opcode = get_u8(&mut src, "opcode")?;
        if opcode != OP_APPEND {
            return Err(ProtocolError::UnknownOpcode(opcode));
        }

        let topic_len = get_u16(&mut src, "topic length")? as usize;
        let topic = get_str(&mut src, topic_len, "topic")?;
        let partition = get_u32(&mut src, "partition")?;
        let count = get_u32(&mut src, "record count")? as usize;

        // Never trust the count for preallocation
        let mut records = Vec::with_capacity(count.min(src.remaining() / 4));
        for _ in 0..count {
            let len = get_u32(&mut src, "record length")? as usize;
            if src.remaining() < len {
                return Err(ProtocolError::Truncated("record"));
            }
            records.push(src.split_to(len));
        }
        if src.has_remaining() {
            return Err(ProtocolError::TrailingBytes(src.remaining()));
        }

        Ok(Self {
            topic,
            partition,
            records,
        })
    }
}

/// Append response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendResponse {
    Ack { base_offset: u64 },
    Nack { status: u8, message: String },
}

impl AppendResponse {
    pub fn encode(&self) -> Bytes {
        let mut dst = BytesMut::new();
        match self {
            Self::Ack { base_offset } => {
                dst.put_u8(STATUS_ACK);
                dst.put_u64(*base_offset);
            }
            Self::Nack { status, message } => {
                // Status 0 is reserved for acks
                dst.put_u8(if *status == STATUS_ACK { 0xFF } else { *status });
                let msg = &message.as_bytes()[..message.len().min(u16::MAX as usize)];
                dst.put_u16(msg.len() as u16);
                dst.put_slice(msg);
            }
        }
        dst.freeze()
    }

    pub fn decode(mut src: Bytes) -> Result<Self, ProtocolError> {
        let status = get_u8(&mut src, "status")?;
        let response = if status == STATUS_ACK {
            Self::Ack {
                base_offset: get_u64(&mut src, "base offset")?,
            }
        } else {
            let len = get_u16(&mut src, "message length")? as usize;
            if src.remaining() < len {
                return Err(ProtocolError::Truncated("message"));
            }
            let raw = src.split_to(len);
            Self::Nack {
                status,
                message: String::from_utf8_lossy(&raw).into_owned(),
            }
        };
        if src.has_remaining() {
            return Err(ProtocolError::TrailingBytes(src.remaining()));
        }
        Ok(response)
    }
}

fn get_u8(src: &mut Bytes, what: &'static str) -> Result<u8, ProtocolError> {
    if src.remaining() < 1 {
        return Err(ProtocolError::Truncated(what));
    }
    Ok(src.get_u8())
}

fn get_u16(src: &mut Bytes, what: &'static str) -> Result<u16, ProtocolError> {
    if src.remaining() < 2 {
        return Err(ProtocolError::Truncated(what));
    }
    Ok(src.get_u16())
}

fn get_u32(src: &mut Bytes, what: &'static str) -> Result<u32, ProtocolError> {
    if src.remaining() < 4 {
        return Err(ProtocolError::Truncated(what));
    }
    Ok(src.get_u32())
}

fn get_u64(src: &mut Bytes, what: &'static str) -> Result<u64, ProtocolError> {
    if src.remaining() < 8 {
        return Err(ProtocolError::Truncated(what));
    }
    Ok(src.get_u64())
}

fn get_str(src: &mut Bytes, len: usize, what: &'static str) -> Result<String, ProtocolError> {
    if src.remaining() < len {
        return Err(ProtocolError::Truncated(what));
    }
    let raw = src.split_to(len);
    String::from_utf8(raw.to_vec()).map_err(|_| ProtocolError::InvalidUtf8(what))
}
