//! BER length encoding and decoding.
//!
//! Length encoding follows X.690 Section 8.1.3:
//! - Short form: single byte, bit 8 clear, value 0-127
//! - Long form: `0x80 | n` followed by `n` big-endian length bytes
//! - Indefinite form (0x80): rejected

use crate::error::{DecodeErrorKind, Error, Result};

/// Maximum length accepted on decode.
///
/// 2MB is far larger than any realistic SNMP message.
pub const MAX_LENGTH: usize = 0x200000;

/// Encode a length, returning its bytes in reverse order for prepending.
///
/// Uses short form for lengths <= 127 and the shortest long form otherwise.
pub fn encode_length(len: usize) -> ([u8; 5], usize) {
    let mut buf = [0u8; 5];

    if len <= 127 {
        buf[0] = len as u8;
        return (buf, 1);
    }

    let mut remaining = len;
    let mut octets = 0;
    while remaining > 0 && octets < 4 {
        buf[octets] = remaining as u8;
        remaining >>= 8;
        octets += 1;
    }
    buf[octets] = 0x80 | octets as u8;
    (buf, octets + 1)
}

/// Decode a length, returning (length, bytes_consumed).
///
/// `base_offset` is the position of `data` in the enclosing message, used
/// for error offsets. Non-minimal long forms are accepted (X.690 Section
/// 8.1.3.5 Note 2).
pub fn decode_length(data: &[u8], base_offset: usize) -> Result<(usize, usize)> {
    let Some(&first) = data.first() else {
        return Err(Error::decode(base_offset, DecodeErrorKind::TruncatedData).boxed());
    };

    if first == 0x80 {
        return Err(Error::decode(base_offset, DecodeErrorKind::IndefiniteLength).boxed());
    }

    if first & 0x80 == 0 {
        return Ok((first as usize, 1));
    }

    let num_octets = (first & 0x7F) as usize;
    if num_octets > 4 {
        return Err(Error::decode(
            base_offset,
            DecodeErrorKind::LengthTooLong { octets: num_octets },
        )
        .boxed());
    }

    let Some(octets) = data.get(1..1 + num_octets) else {
        return Err(Error::decode(base_offset, DecodeErrorKind::TruncatedData).boxed());
    };
    let len = octets
        .iter()
        .fold(0usize, |acc, &b| (acc << 8) | b as usize);

    if len > MAX_LENGTH {
        return Err(Error::decode(
            base_offset,
            DecodeErrorKind::LengthExceedsMax {
                length: len,
                max: MAX_LENGTH,
            },
        )
        .boxed());
    }

    Ok((len, 1 + num_octets))
}
