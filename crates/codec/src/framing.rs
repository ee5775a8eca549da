//! Stream framing for tagged packets
//!
//! Packets are self-delimiting, so a byte stream of concatenated packets is
//! split on packet boundaries without an extra length prefix. Each frame is
//! handed out as a [`RawPacket`] carrying its top-level tag; the body is only
//! decoded further down the pipeline.

use std::io;

use bytes::{BufMut, BytesMut};
use contracts::RawPacket;
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::CodecError;
use crate::packet::{peek_header, MAX_PACKET_SIZE};

/// Errors surfaced by [`PacketCodec`]
#[derive(Debug, Error)]
pub enum FramingError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// tokio-util codec splitting a byte stream into raw packets
#[derive(Debug, Clone)]
pub struct PacketCodec {
    max_packet_size: usize,
}

impl Default for PacketCodec {
    fn default() -> Self {
        Self::new(MAX_PACKET_SIZE)
    }
}

impl PacketCodec {
    pub fn new(max_packet_size: usize) -> Self {
        Self { max_packet_size }
    }

    pub fn max_packet_size(&self) -> usize {
        self.max_packet_size
    }
}

impl Decoder for PacketCodec {
    type Item = RawPacket;
    type Error = FramingError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(header) = peek_header(src, self.max_packet_size)? else {
            return Ok(None);
        };

        let total = header.total_len();
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        let frame = src.split_to(total).freeze();
        Ok(Some(RawPacket::new(header.tag, frame)))
    }
}

impl Encoder<RawPacket> for PacketCodec {
    type Error = FramingError;

    fn encode(&mut self, item: RawPacket, dst: &mut BytesMut) -> Result<(), Self::Error> {
        // Only well-formed single packets go on the wire
        let header = peek_header(&item.frame, self.max_packet_size)?.ok_or(
            CodecError::Truncated {
                needed: item.len() + 1,
                available: item.len(),
            },
        )?;

        if header.total_len() != item.len() {
            return Err(if header.total_len() > item.len() {
                CodecError::Truncated {
                    needed: header.total_len(),
                    available: item.len(),
                }
            } else {
                CodecError::TrailingBytes {
                    count: item.len() - header.total_len(),
                }
            }
            .into());
        }

        if header.tag != item.tag {
            return Err(CodecError::InvalidTag { tag: item.tag }.into());
        }

        dst.reserve(item.len());
        dst.put_slice(&item.frame);
        Ok(())
    }
}
