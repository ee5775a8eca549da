//! Tagged packet model, encoder and decoder
//!
//! # Wire Format
//!
//! ```text
//! +--------+------------+-----------------+
//! | header | length     | value           |
//! | (u8)   | (ULEB128)  | (length bytes)  |
//! +--------+------------+-----------------+
//! ```
//!
//! | Bit | Meaning |
//! |-----|---------|
//! | 7 | NODE: value is a concatenation of child packets |
//! | 6 | reserved, must be 0 |
//! | 0-5 | tag id |
//!
//! Primitive values:
//! - `float32`: 4 bytes, IEEE-754 big-endian
//! - `int64`: zigzag ULEB128, occupying the whole value
//! - `utf8`: raw UTF-8 bytes

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::CodecError;
use crate::varint::{decode_uvarint, put_uvarint, uvarint_len, zigzag_decode, zigzag_encode, VarintError};

/// Header bit marking a node packet.
pub const NODE_FLAG: u8 = 0x80;

/// Reserved header bit.
pub const RESERVED_FLAG: u8 = 0x40;

/// Mask selecting the tag id from a header byte.
pub const TAG_ID_MASK: u8 = 0x3F;

/// Largest packet accepted by default (header included).
pub const MAX_PACKET_SIZE: usize = 1024 * 1024;

/// Maximum node nesting accepted by the decoder.
pub const MAX_DEPTH: usize = 16;

/// Parsed packet header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Tag id (flags stripped)
    pub tag: u8,
    /// Whether the value holds child packets
    pub is_node: bool,
    /// Header byte plus length varint
    pub header_len: usize,
    /// Declared value length
    pub value_len: usize,
}

impl Header {
    /// Size of the complete packet
    pub fn total_len(&self) -> usize {
        self.header_len + self.value_len
    }
}

/// Read the header at the start of `buf`
///
/// Returns `Ok(None)` when `buf` does not yet hold a complete header. The value
/// itself may still be incomplete; compare `total_len()` with `buf.len()`.
pub fn peek_header(buf: &[u8], max_packet_size: usize) -> Result<Option<Header>, CodecError> {
    let Some(&first) = buf.first() else {
        return Ok(None);
    };

    if first & RESERVED_FLAG != 0 {
        return Err(CodecError::ReservedFlag { header: first });
    }

    let (value_len, varint_len) = match decode_uvarint(&buf[1..]) {
        Ok(decoded) => decoded,
        Err(VarintError::UnexpectedEof) => return Ok(None),
        Err(VarintError::Overflow) => return Err(CodecError::LengthOverflow),
    };

    let header_len = 1 + varint_len;
    let value_len = usize::try_from(value_len).map_err(|_| CodecError::LengthOverflow)?;
    let total = header_len
        .checked_add(value_len)
        .ok_or(CodecError::LengthOverflow)?;

    if total > max_packet_size {
        return Err(CodecError::TooLarge {
            len: total,
            max: max_packet_size,
        });
    }

    Ok(Some(Header {
        tag: first & TAG_ID_MASK,
        is_node: first & NODE_FLAG != 0,
        header_len,
        value_len,
    }))
}

/// A decoded packet
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// Leaf carrying raw value bytes
    Primitive { tag: u8, value: Bytes },
    /// Composite carrying child packets in order
    Node { tag: u8, children: Vec<Packet> },
}

impl Packet {
    pub fn primitive(tag: u8, value: impl Into<Bytes>) -> Self {
        Self::Primitive {
            tag,
            value: value.into(),
        }
    }

    pub fn node(tag: u8, children: Vec<Packet>) -> Self {
        Self::Node { tag, children }
    }

    pub fn float32(tag: u8, value: f32) -> Self {
        Self::primitive(tag, Bytes::copy_from_slice(&value.to_be_bytes()))
    }

    pub fn int64(tag: u8, value: i64) -> Self {
        let mut buf = BytesMut::with_capacity(uvarint_len(zigzag_encode(value)));
        put_uvarint(&mut buf, zigzag_encode(value));
        Self::primitive(tag, buf.freeze())
    }

    pub fn utf8(tag: u8, value: &str) -> Self {
        Self::primitive(tag, Bytes::copy_from_slice(value.as_bytes()))
    }

    pub fn tag(&self) -> u8 {
        match self {
            Self::Primitive { tag, .. } | Self::Node { tag, .. } => *tag,
        }
    }

    pub fn is_node(&self) -> bool {
        matches!(self, Self::Node { .. })
    }

    fn value_len(&self) -> usize {
        match self {
            Self::Primitive { value, .. } => value.len(),
            Self::Node { children, .. } => children.iter().map(Packet::encoded_len).sum(),
        }
    }

    /// Size of the packet once encoded
    pub fn encoded_len(&self) -> usize {
        let value_len = self.value_len();
        1 + uvarint_len(value_len as u64) + value_len
    }

    /// Append the encoded packet to `dst`
    pub fn encode(&self, dst: &mut BytesMut) -> Result<(), CodecError> {
        let tag = self.tag();
        if tag > TAG_ID_MASK {
            return Err(CodecError::InvalidTag { tag });
        }

        dst.reserve(self.encoded_len());
        match self {
            Self::Primitive { value, .. } => {
                dst.put_u8(tag);
                put_uvarint(dst, value.len() as u64);
                dst.put_slice(value);
            }
            Self::Node { children, .. } => {
                dst.put_u8(tag | NODE_FLAG);
                put_uvarint(dst, self.value_len() as u64);
                for child in children {
                    child.encode(dst)?;
                }
            }
        }
        Ok(())
    }

    /// Encode into a fresh buffer
    pub fn to_bytes(&self) -> Result<Bytes, CodecError> {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Decode exactly one packet spanning all of `frame`
    pub fn decode(frame: &Bytes) -> Result<Packet, CodecError> {
        let (packet, used) = decode_prefix(frame, 0)?;
        if used != frame.len() {
            return Err(CodecError::TrailingBytes {
                count: frame.len() - used,
            });
        }
        Ok(packet)
    }

    /// Child packets of a node
    pub fn children(&self) -> Result<&[Packet], CodecError> {
        match self {
            Self::Node { children, .. } => Ok(children),
            Self::Primitive { tag, .. } => Err(CodecError::WrongShape {
                tag: *tag,
                expected: "node",
            }),
        }
    }

    /// First child carrying `tag`, if any
    pub fn child(&self, tag: u8) -> Option<&Packet> {
        match self {
            Self::Node { children, .. } => children.iter().find(|c| c.tag() == tag),
            Self::Primitive { .. } => None,
        }
    }

    /// Raw value of a primitive
    pub fn value(&self) -> Result<&Bytes, CodecError> {
        match self {
            Self::Primitive { value, .. } => Ok(value),
            Self::Node { tag, .. } => Err(CodecError::WrongShape {
                tag: *tag,
                expected: "primitive",
            }),
        }
    }

    pub fn as_f32(&self) -> Result<f32, CodecError> {
        let value = self.value()?;
        let raw: [u8; 4] = value
            .as_ref()
            .try_into()
            .map_err(|_| CodecError::WrongType {
                tag: self.tag(),
                expected: "float32",
                message: format!("expected 4 bytes, got {}", value.len()),
            })?;
        Ok(f32::from_be_bytes(raw))
    }

    pub fn as_i64(&self) -> Result<i64, CodecError> {
        let value = self.value()?;
        let wrong = |message: String| CodecError::WrongType {
            tag: self.tag(),
            expected: "int64",
            message,
        };
        let (raw, used) = decode_uvarint(value).map_err(|e| wrong(format!("{e:?}")))?;
        if used != value.len() {
            return Err(wrong(format!("{} trailing bytes", value.len() - used)));
        }
        Ok(zigzag_decode(raw))
    }

    pub fn as_str(&self) -> Result<&str, CodecError> {
        let value = self.value()?;
        std::str::from_utf8(value).map_err(|e| CodecError::WrongType {
            tag: self.tag(),
            expected: "utf8",
            message: e.to_string(),
        })
    }
}

fn decode_prefix(buf: &Bytes, depth: usize) -> Result<(Packet, usize), CodecError> {
    let header = peek_header(buf, MAX_PACKET_SIZE)?.ok_or(CodecError::Truncated {
        needed: buf.len() + 1,
        available: buf.len(),
    })?;

    let total = header.total_len();
    if buf.len() < total {
        return Err(CodecError::Truncated {
            needed: total,
            available: buf.len(),
        });
    }

    let value = buf.slice(header.header_len..total);

    if !header.is_node {
        return Ok((
            Packet::Primitive {
                tag: header.tag,
                value,
            },
            total,
        ));
    }

    if depth >= MAX_DEPTH {
        return Err(CodecError::WrongShape {
            tag: header.tag,
            expected: "node within nesting limit",
        });
    }

    let mut children = Vec::new();
    let mut offset = 0;
    while offset < value.len() {
        let (child, used) = decode_prefix(&value.slice(offset..), depth + 1)?;
        children.push(child);
        offset += used;
    }

    Ok((
        Packet::Node {
            tag: header.tag,
            children,
        },
        total,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading() -> Packet {
        Packet::node(
            0x10,
            vec![
                Packet::float32(0x11, 12.5),
                Packet::int64(0x12, 1_700_000_000_123),
                Packet::utf8(0x13, "sensor-a"),
            ],
        )
    }

    #[test]
    fn test_primitive_wire_layout() {
        let bytes = Packet::utf8(0x13, "ab").to_bytes().unwrap();
        assert_eq!(bytes.as_ref(), &[0x13, 0x02, b'a', b'b']);
    }

    #[test]
    fn test_node_header_flag() {
        let bytes = reading().to_bytes().unwrap();
        assert_eq!(bytes[0], 0x10 | NODE_FLAG);
        assert_eq!(bytes.len(), reading().encoded_len());
    }

    #[test]
    fn test_decode_node_fields() {
        let bytes = reading().to_bytes().unwrap();
        let packet = Packet::decode(&bytes).unwrap();
        assert_eq!(packet.tag(), 0x10);
        assert_eq!(packet.children().unwrap().len(), 3);
        assert_eq!(packet.child(0x11).unwrap().as_f32().unwrap(), 12.5);
        assert_eq!(
            packet.child(0x12).unwrap().as_i64().unwrap(),
            1_700_000_000_123
        );
        assert_eq!(packet.child(0x13).unwrap().as_str().unwrap(), "sensor-a");
    }

    #[test]
    fn test_truncated_value() {
        let bytes = reading().to_bytes().unwrap();
        let cut = bytes.slice(..bytes.len() - 3);
        assert!(matches!(
            Packet::decode(&cut),
            Err(CodecError::Truncated { .. })
        ));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut buf = BytesMut::new();
        Packet::utf8(0x01, "x").encode(&mut buf).unwrap();
        buf.put_u8(0xAA);
        assert_eq!(
            Packet::decode(&buf.freeze()),
            Err(CodecError::TrailingBytes { count: 1 })
        );
    }

    #[test]
    fn test_reserved_flag_rejected() {
        let frame = Bytes::from_static(&[0x40 | 0x01, 0x00]);
        assert!(matches!(
            Packet::decode(&frame),
            Err(CodecError::ReservedFlag { .. })
        ));
    }

    #[test]
    fn test_invalid_tag_on_encode() {
        assert_eq!(
            Packet::utf8(0x40, "x").to_bytes(),
            Err(CodecError::InvalidTag { tag: 0x40 })
        );
    }

    #[test]
    fn test_wrong_types() {
        let packet = Packet::utf8(0x11, "abc");
        assert!(matches!(
            packet.as_f32(),
            Err(CodecError::WrongType { expected: "float32", .. })
        ));
        assert!(matches!(
            Packet::primitive(0x13, vec![0xFF, 0xFE]).as_str(),
            Err(CodecError::WrongType { expected: "utf8", .. })
        ));
        assert!(matches!(
            Packet::primitive(0x12, vec![0x01, 0x02]).as_i64(),
            Err(CodecError::WrongType { expected: "int64", .. })
        ));
        assert!(matches!(
            reading().as_f32(),
            Err(CodecError::WrongShape { expected: "primitive", .. })
        ));
    }

    #[test]
    fn test_peek_header_incomplete() {
        assert_eq!(peek_header(&[], MAX_PACKET_SIZE), Ok(None));
        // Length varint still continuing
        assert_eq!(peek_header(&[0x10, 0x80], MAX_PACKET_SIZE), Ok(None));
    }

    #[test]
    fn test_peek_header_too_large() {
        let mut buf = BytesMut::new();
        buf.put_u8(0x01);
        put_uvarint(&mut buf, 2048);
        assert!(matches!(
            peek_header(&buf, 1024),
            Err(CodecError::TooLarge { max: 1024, .. })
        ));
    }

    #[test]
    fn test_excessive_nesting_rejected() {
        let mut packet = Packet::utf8(0x01, "leaf");
        for _ in 0..=MAX_DEPTH {
            packet = Packet::node(0x02, vec![packet]);
        }
        let bytes = packet.to_bytes().unwrap();
        assert!(Packet::decode(&bytes).is_err());
    }
}
