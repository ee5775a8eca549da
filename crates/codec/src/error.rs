//! Codec error types

use thiserror::Error;

use crate::varint::VarintError;

/// Errors raised while encoding or decoding tagged packets
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Buffer shorter than the header or declared length
    #[error("truncated packet: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    /// Length varint does not fit in u64
    #[error("length varint overflow")]
    LengthOverflow,

    /// Declared length exceeds the configured maximum
    #[error("packet of {len} bytes exceeds maximum of {max}")]
    TooLarge { len: usize, max: usize },

    /// Header byte uses reserved flag bits
    #[error("reserved flag bits set in header byte {header:#04x}")]
    ReservedFlag { header: u8 },

    /// Tag id outside the 6-bit range
    #[error("tag {tag:#04x} does not fit in 6 bits")]
    InvalidTag { tag: u8 },

    /// Bytes left after a complete packet
    #[error("{count} trailing bytes after packet")]
    TrailingBytes { count: usize },

    /// Primitive accessed as a node, or the reverse
    #[error("packet {tag:#04x} is not a {expected}")]
    WrongShape { tag: u8, expected: &'static str },

    /// Primitive value cannot be read as the requested type
    #[error("packet {tag:#04x} is not a valid {expected}: {message}")]
    WrongType {
        tag: u8,
        expected: &'static str,
        message: String,
    },
}

impl From<VarintError> for CodecError {
    fn from(e: VarintError) -> Self {
        match e {
            // Callers map EOF to `Truncated` with real sizes before this fires
            VarintError::UnexpectedEof => Self::Truncated {
                needed: 1,
                available: 0,
            },
            VarintError::Overflow => Self::LengthOverflow,
        }
    }
}
