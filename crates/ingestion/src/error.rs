//! Ingestion error types

use codec::CodecError;
use thiserror::Error;

/// Why a raw packet could not become a `SensorRecord`
///
/// Never fatal: the ingestion stage counts, logs and drops the packet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Top-level tag differs from the subscribed one
    #[error("unexpected tag {actual:#04x}, expected {expected:#04x}")]
    TagMismatch { expected: u8, actual: u8 },

    /// Packet framing is broken (truncated, oversized, reserved bits...)
    #[error("malformed packet: {0}")]
    Malformed(#[source] CodecError),

    /// Reading packet is a primitive instead of a node
    #[error("packet {tag:#04x} is not a node")]
    NotANode { tag: u8 },

    /// Required field absent
    #[error("missing field `{field}`")]
    MissingField { field: &'static str },

    /// Field present but not decodable as its type
    #[error("invalid field `{field}`: {source}")]
    InvalidField {
        field: &'static str,
        #[source]
        source: CodecError,
    },
}

impl DecodeError {
    /// Offending field, when the error can be pinned to one
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::MissingField { field } | Self::InvalidField { field, .. } => Some(field),
            _ => None,
        }
    }

    /// Short label for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TagMismatch { .. } => "tag_mismatch",
            Self::Malformed(_) => "malformed",
            Self::NotANode { .. } => "not_a_node",
            Self::MissingField { .. } => "missing_field",
            Self::InvalidField { .. } => "invalid_field",
        }
    }
}

/// Ingestion Result type alias
pub type Result<T> = std::result::Result<T, DecodeError>;
