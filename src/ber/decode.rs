//! BER decoding.
//!
//! Zero-copy decoding using `Bytes`. Every failure is logged at debug level
//! under `snmp_manager::ber` and returned as [`Error::Decode`] carrying the
//! absolute offset into the outermost buffer.

use bytes::Bytes;

use super::length::decode_length;
use super::tag;
use crate::error::{DecodeErrorKind, Error, Result};
use crate::oid::Oid;

/// How strictly integers and message framing are checked.
///
/// `Strict` enforces DER-style minimal integer encoding and rejects
/// trailing bytes. `Lenient` accepts what real agents have been seen to
/// send: padded integers, integers wider than their type (keeping the low
/// bits), counters encoded without their sign octet, and trailing garbage
/// after the message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DecodePolicy {
    /// Reject non-minimal or oversized integers and trailing data.
    #[default]
    Strict,
    /// Accept common agent encoding mistakes.
    Lenient,
}

/// BER decoder that reads from a byte buffer.
#[derive(Debug, Clone)]
pub struct Decoder {
    data: Bytes,
    offset: usize,
    /// Offset of `data[0]` within the outermost buffer.
    base: usize,
    policy: DecodePolicy,
}

impl Decoder {
    /// Create a strict decoder over `data`.
    pub fn new(data: Bytes) -> Self {
        Self::with_policy(data, DecodePolicy::Strict)
    }

    /// Create a decoder with an explicit policy.
    pub fn with_policy(data: Bytes, policy: DecodePolicy) -> Self {
        Self {
            data,
            offset: 0,
            base: 0,
            policy,
        }
    }

    /// Create a strict decoder from a byte slice (copies the data).
    pub fn from_slice(data: &[u8]) -> Self {
        Self::new(Bytes::copy_from_slice(data))
    }

    /// The policy this decoder applies.
    pub fn policy(&self) -> DecodePolicy {
        self.policy
    }

    /// Absolute offset of the next byte.
    pub fn offset(&self) -> usize {
        self.base + self.offset
    }

    /// Get remaining bytes.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    /// Check if we've reached the end.
    pub fn is_empty(&self) -> bool {
        self.offset >= self.data.len()
    }

    /// Peek at the next tag without consuming it.
    pub fn peek_tag(&self) -> Option<u8> {
        self.data.get(self.offset).copied()
    }

    /// Build a decode error at the current position.
    pub fn error(&self, kind: DecodeErrorKind) -> Box<Error> {
        self.error_at(self.offset(), kind)
    }

    fn error_at(&self, offset: usize, kind: DecodeErrorKind) -> Box<Error> {
        tracing::debug!(target: "snmp_manager::ber", { snmp.offset = offset, kind = %kind }, "decode error");
        Error::decode(offset, kind).boxed()
    }

    /// Read a single byte.
    pub fn read_byte(&mut self) -> Result<u8> {
        let Some(&byte) = self.data.get(self.offset) else {
            return Err(self.error(DecodeErrorKind::TruncatedData));
        };
        self.offset += 1;
        Ok(byte)
    }

    /// Read a tag byte.
    pub fn read_tag(&mut self) -> Result<u8> {
        self.read_byte()
    }

    /// Read a length.
    pub fn read_length(&mut self) -> Result<usize> {
        let (len, consumed) = decode_length(&self.data[self.offset..], self.offset())?;
        self.offset += consumed;
        Ok(len)
    }

    /// Read raw bytes without copying.
    pub fn read_bytes(&mut self, len: usize) -> Result<Bytes> {
        if self.offset.saturating_add(len) > self.data.len() {
            return Err(self.error(DecodeErrorKind::TlvOverflow));
        }
        let bytes = self.data.slice(self.offset..self.offset + len);
        self.offset += len;
        Ok(bytes)
    }

    /// Read and expect a specific tag, returning the content length.
    pub fn expect_tag(&mut self, expected: u8) -> Result<usize> {
        let at = self.offset();
        let actual = self.read_tag()?;
        if actual != expected {
            return Err(self.error_at(at, DecodeErrorKind::UnexpectedTag { expected, actual }));
        }
        self.read_length()
    }

    /// Read a BER INTEGER as `i32`.
    pub fn read_integer(&mut self) -> Result<i32> {
        let len = self.expect_tag(tag::universal::INTEGER)?;
        self.read_integer_value(len)
    }

    /// Read INTEGER content octets given the length.
    pub fn read_integer_value(&mut self, len: usize) -> Result<i32> {
        let at = self.offset();
        let bytes = self.read_integer_content(len)?;
        self.check_minimal(at, &bytes)?;
        if bytes.len() > 4 {
            self.oversized(at, bytes.len())?;
        }

        // Shifting an i32 drops the high octets, which is the lenient truncation.
        let seed: i32 = if bytes[0] & 0x80 != 0 { -1 } else { 0 };
        Ok(bytes
            .iter()
            .fold(seed, |acc, &byte| (acc << 8) | i32::from(byte)))
    }

    /// Read an unsigned 32-bit application value with the given tag.
    pub fn read_unsigned32(&mut self, expected_tag: u8) -> Result<u32> {
        let len = self.expect_tag(expected_tag)?;
        self.read_unsigned32_value(len)
    }

    /// Read unsigned 32-bit content octets given the length.
    pub fn read_unsigned32_value(&mut self, len: usize) -> Result<u32> {
        let at = self.offset();
        let bytes = self.read_integer_content(len)?;
        self.check_unsigned(at, &bytes, 4)?;
        Ok(bytes
            .iter()
            .fold(0u32, |acc, &byte| (acc << 8) | u32::from(byte)))
    }

    /// Read a Counter64.
    pub fn read_counter64(&mut self) -> Result<u64> {
        let len = self.expect_tag(tag::application::COUNTER64)?;
        self.read_counter64_value(len)
    }

    /// Read Counter64 content octets given the length.
    pub fn read_counter64_value(&mut self, len: usize) -> Result<u64> {
        let at = self.offset();
        let bytes = self.read_integer_content(len)?;
        self.check_unsigned(at, &bytes, 8)?;
        Ok(bytes
            .iter()
            .fold(0u64, |acc, &byte| (acc << 8) | u64::from(byte)))
    }

    /// Read integer content octets, rejecting an empty encoding.
    fn read_integer_content(&mut self, len: usize) -> Result<Bytes> {
        if len == 0 {
            return Err(self.error(DecodeErrorKind::ZeroLengthInteger));
        }
        self.read_bytes(len)
    }

    /// Reject a non-minimal encoding under `Strict`.
    fn check_minimal(&self, at: usize, bytes: &[u8]) -> Result<()> {
        if self.policy == DecodePolicy::Strict && !is_minimal(bytes) {
            return Err(self.error_at(at, DecodeErrorKind::NonMinimalInteger));
        }
        Ok(())
    }

    /// Validate an unsigned value of `width` octets.
    ///
    /// One extra leading 0x00 is always allowed. A set sign bit or extra
    /// width is an overflow under `Strict`. The sign bit is checked before
    /// minimality: `FF FF FF FF` is a missing sign octet, not a padded -1.
    fn check_unsigned(&self, at: usize, bytes: &[u8], width: usize) -> Result<()> {
        if bytes[0] & 0x80 != 0 {
            if self.policy == DecodePolicy::Strict {
                return Err(self.error_at(at, DecodeErrorKind::IntegerOverflow));
            }
            tracing::debug!(target: "snmp_manager::ber", { snmp.offset = at }, "unsigned value without sign octet, reading as unsigned");
        } else {
            self.check_minimal(at, bytes)?;
        }
        let significant = match bytes {
            [0, rest @ ..] => rest.len(),
            _ => bytes.len(),
        };
        if significant > width {
            self.oversized(at, bytes.len())?;
        }
        Ok(())
    }

    fn oversized(&self, at: usize, len: usize) -> Result<()> {
        if self.policy == DecodePolicy::Strict {
            return Err(self.error_at(at, DecodeErrorKind::IntegerOverflow));
        }
        tracing::warn!(target: "snmp_manager::ber", { snmp.offset = at, length = len }, "integer too long, keeping low-order bytes");
        Ok(())
    }

    /// Read an OCTET STRING.
    pub fn read_octet_string(&mut self) -> Result<Bytes> {
        let len = self.expect_tag(tag::universal::OCTET_STRING)?;
        self.read_bytes(len)
    }

    /// Read a NULL.
    pub fn read_null(&mut self) -> Result<()> {
        let len = self.expect_tag(tag::universal::NULL)?;
        self.read_null_value(len)
    }

    /// Check NULL content given the length.
    pub fn read_null_value(&mut self, len: usize) -> Result<()> {
        if len != 0 {
            return Err(self.error(DecodeErrorKind::InvalidNull));
        }
        Ok(())
    }

    /// Read an OBJECT IDENTIFIER.
    pub fn read_oid(&mut self) -> Result<Oid> {
        let len = self.expect_tag(tag::universal::OBJECT_IDENTIFIER)?;
        self.read_oid_value(len)
    }

    /// Read OID content octets given the length.
    pub fn read_oid_value(&mut self, len: usize) -> Result<Oid> {
        let start = self.offset();
        let bytes = self.read_bytes(len)?;
        Oid::from_ber(&bytes).map_err(|e| match *e {
            Error::Decode { offset, kind } => self.error_at(start + offset, kind),
            other => other.boxed(),
        })
    }

    /// Read an IpAddress.
    pub fn read_ip_address(&mut self) -> Result<[u8; 4]> {
        let len = self.expect_tag(tag::application::IP_ADDRESS)?;
        self.read_ip_address_value(len)
    }

    /// Read IpAddress content octets given the length.
    pub fn read_ip_address_value(&mut self, len: usize) -> Result<[u8; 4]> {
        if len != 4 {
            return Err(self.error(DecodeErrorKind::InvalidIpAddressLength { length: len }));
        }
        let bytes = self.read_bytes(4)?;
        Ok([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    /// Read a SEQUENCE, returning a decoder for its contents.
    pub fn read_sequence(&mut self) -> Result<Decoder> {
        self.read_constructed(tag::universal::SEQUENCE)
    }

    /// Read a constructed element with a specific tag, returning a decoder for its contents.
    pub fn read_constructed(&mut self, expected_tag: u8) -> Result<Decoder> {
        let len = self.expect_tag(expected_tag)?;
        self.sub_decoder(len)
    }

    /// Split off the next `len` bytes as their own decoder.
    pub fn sub_decoder(&mut self, len: usize) -> Result<Decoder> {
        let base = self.offset();
        let data = self.read_bytes(len)?;
        Ok(Decoder {
            data,
            offset: 0,
            base,
            policy: self.policy,
        })
    }

    /// Skip a TLV without parsing it.
    pub fn skip_tlv(&mut self) -> Result<()> {
        self.read_tag()?;
        let len = self.read_length()?;
        self.read_bytes(len).map(|_| ())
    }

    /// Require that everything has been consumed.
    ///
    /// Under `Lenient`, leftover bytes are logged and ignored.
    pub fn finish(&self) -> Result<()> {
        let remaining = self.remaining();
        if remaining == 0 {
            return Ok(());
        }
        if self.policy == DecodePolicy::Lenient {
            tracing::debug!(target: "snmp_manager::ber", { snmp.offset = self.offset(), remaining }, "ignoring trailing bytes");
            return Ok(());
        }
        Err(self.error(DecodeErrorKind::TrailingData { remaining }))
    }
}

/// Check X.690 Section 8.3.2: the first nine bits must not be all zeros or all ones.
fn is_minimal(bytes: &[u8]) -> bool {
    match bytes {
        [0x00, next, ..] => next & 0x80 != 0,
        [0xFF, next, ..] => next & 0x80 == 0,
        _ => true,
    }
}
