//! ULEB128 (Unsigned Little-Endian Base 128) variable-length integers.
//!
//! Used for packet lengths and, after zigzag mapping, for signed integer
//! values.
//!
//! - Each byte carries 7 data bits, bit 7 flags continuation
//! - Values 0-127 encode in 1 byte
//! - Maximum encoded length for u64 is 10 bytes

use bytes::BufMut;

/// Maximum bytes needed to encode a u64 in ULEB128.
pub const MAX_VARINT_LEN: usize = 10;

const CONTINUATION_BIT: u8 = 0x80;
const DATA_MASK: u8 = 0x7F;

/// Error returned when varint decoding fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarintError {
    /// Buffer ends before the varint terminates.
    UnexpectedEof,
    /// More than 10 bytes, or bits beyond u64.
    Overflow,
}

/// Append `value` as ULEB128.
#[inline]
pub fn put_uvarint<B: BufMut>(dst: &mut B, mut value: u64) {
    loop {
        let byte = (value & u64::from(DATA_MASK)) as u8;
        value >>= 7;
        if value == 0 {
            dst.put_u8(byte);
            return;
        }
        dst.put_u8(byte | CONTINUATION_BIT);
    }
}

/// Number of bytes `value` occupies once encoded.
#[inline]
#[must_use]
pub const fn uvarint_len(value: u64) -> usize {
    if value == 0 {
        return 1;
    }
    let bits = 64 - value.leading_zeros() as usize;
    bits.div_ceil(7)
}

/// Decode a ULEB128 value from the start of `buf`.
///
/// Returns `(value, bytes_consumed)`.
#[inline]
pub fn decode_uvarint(buf: &[u8]) -> Result<(u64, usize), VarintError> {
    let mut result: u64 = 0;
    let mut shift: u32 = 0;

    for (i, &byte) in buf.iter().enumerate() {
        if i >= MAX_VARINT_LEN {
            return Err(VarintError::Overflow);
        }

        let data = u64::from(byte & DATA_MASK);

        // At shift 63 only bit 0 still fits in a u64
        if shift == 63 && data > 1 {
            return Err(VarintError::Overflow);
        }

        result |= data << shift;

        if byte & CONTINUATION_BIT == 0 {
            return Ok((result, i + 1));
        }

        shift += 7;
    }

    Err(VarintError::UnexpectedEof)
}

/// Map a signed value onto u64 so small magnitudes stay short.
#[inline]
#[must_use]
pub const fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// Inverse of [`zigzag_encode`].
#[inline]
#[must_use]
pub const fn zigzag_decode(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_encoding() {
        let mut buf = Vec::new();
        put_uvarint(&mut buf, 300);
        assert_eq!(buf, vec![0xAC, 0x02]);
        assert_eq!(decode_uvarint(&buf), Ok((300, 2)));
    }

    #[test]
    fn test_len_matches_encoding() {
        for value in [0u64, 1, 127, 128, 16_383, 16_384, u64::from(u32::MAX), u64::MAX] {
            let mut buf = Vec::new();
            put_uvarint(&mut buf, value);
            assert_eq!(buf.len(), uvarint_len(value), "value {value}");
        }
        assert_eq!(uvarint_len(u64::MAX), MAX_VARINT_LEN);
    }

    #[test]
    fn test_truncated() {
        assert_eq!(decode_uvarint(&[0x80, 0x80]), Err(VarintError::UnexpectedEof));
        assert_eq!(decode_uvarint(&[]), Err(VarintError::UnexpectedEof));
    }

    #[test]
    fn test_overflow() {
        let too_long = [0xFFu8; 11];
        assert_eq!(decode_uvarint(&too_long), Err(VarintError::Overflow));

        let mut tenth_byte_too_big = [0xFFu8; 10];
        tenth_byte_too_big[9] = 0x02;
        assert_eq!(decode_uvarint(&tenth_byte_too_big), Err(VarintError::Overflow));
    }

    #[test]
    fn test_zigzag() {
        assert_eq!(zigzag_encode(0), 0);
        assert_eq!(zigzag_encode(-1), 1);
        assert_eq!(zigzag_encode(1), 2);
        assert_eq!(zigzag_decode(zigzag_encode(i64::MIN)), i64::MIN);
        assert_eq!(zigzag_decode(zigzag_encode(i64::MAX)), i64::MAX);
        assert_eq!(zigzag_decode(zigzag_encode(1_700_000_000_000)), 1_700_000_000_000);
    }
}
