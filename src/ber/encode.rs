//! BER encoding.
//!
//! [`EncodeBuf`] builds a message back to front: each element is written
//! content first, then its length, then its tag. Constructed lengths are
//! therefore known when they are written and nothing is ever shifted.
//! [`EncodeBuf::finish`] flips the buffer into wire order.

use bytes::Bytes;

use super::length::encode_length;
use super::tag;
use crate::oid::Oid;

/// Reverse-order BER encode buffer.
#[derive(Debug, Default)]
pub struct EncodeBuf {
    buf: Vec<u8>,
}

impl EncodeBuf {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty buffer with room for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Check if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Prepend raw bytes, keeping their order.
    pub fn push_bytes(&mut self, data: &[u8]) {
        self.buf.extend(data.iter().rev());
    }

    /// Prepend a tag byte.
    pub fn push_tag(&mut self, tag: u8) {
        self.buf.push(tag);
    }

    /// Prepend a length in short or long form.
    pub fn push_length(&mut self, len: usize) {
        let (bytes, n) = encode_length(len);
        self.buf.extend_from_slice(&bytes[..n]);
    }

    /// Prepend a constructed element.
    ///
    /// `contents` must push the children in reverse order (last child first).
    pub fn push_constructed(&mut self, tag: u8, contents: impl FnOnce(&mut Self)) {
        let start = self.buf.len();
        contents(self);
        let len = self.buf.len() - start;
        self.push_length(len);
        self.push_tag(tag);
    }

    /// Prepend a SEQUENCE.
    pub fn push_sequence(&mut self, contents: impl FnOnce(&mut Self)) {
        self.push_constructed(tag::universal::SEQUENCE, contents);
    }

    /// Prepend a primitive element with the given tag and content.
    fn push_primitive(&mut self, tag: u8, content: &[u8]) {
        self.push_bytes(content);
        self.push_length(content.len());
        self.push_tag(tag);
    }

    /// Prepend an INTEGER in minimal two's-complement form.
    pub fn push_integer(&mut self, value: i32) {
        let bytes = value.to_be_bytes();
        self.push_primitive(tag::universal::INTEGER, minimal_signed(&bytes));
    }

    /// Prepend an unsigned 32-bit application value (Counter32, Gauge32, TimeTicks).
    ///
    /// A leading 0x00 is added when the high bit is set so the value
    /// stays non-negative.
    pub fn push_unsigned32(&mut self, tag: u8, value: u32) {
        let bytes = u64::from(value).to_be_bytes();
        self.push_primitive(tag, minimal_signed(&bytes));
    }

    /// Prepend a Counter64.
    pub fn push_counter64(&mut self, value: u64) {
        let mut bytes = [0u8; 9];
        bytes[1..].copy_from_slice(&value.to_be_bytes());
        self.push_primitive(tag::application::COUNTER64, minimal_signed(&bytes));
    }

    /// Prepend an OCTET STRING.
    pub fn push_octet_string(&mut self, data: &[u8]) {
        self.push_primitive(tag::universal::OCTET_STRING, data);
    }

    /// Prepend a NULL.
    pub fn push_null(&mut self) {
        self.push_primitive(tag::universal::NULL, &[]);
    }

    /// Prepend an OBJECT IDENTIFIER.
    pub fn push_oid(&mut self, oid: &Oid) {
        self.push_primitive(tag::universal::OBJECT_IDENTIFIER, &oid.to_ber());
    }

    /// Prepend an IpAddress.
    pub fn push_ip_address(&mut self, addr: [u8; 4]) {
        self.push_primitive(tag::application::IP_ADDRESS, &addr);
    }

    /// Flip into wire order.
    pub fn finish(mut self) -> Bytes {
        self.buf.reverse();
        Bytes::from(self.buf)
    }
}

/// Strip redundant leading sign octets from a big-endian two's-complement value.
///
/// A leading 0x00 is redundant when the next byte's high bit is clear, and a
/// leading 0xFF when it is set (X.690 Section 8.3.2).
fn minimal_signed(bytes: &[u8]) -> &[u8] {
    let mut start = 0;
    while start + 1 < bytes.len() {
        let (lead, next) = (bytes[start], bytes[start + 1]);
        let redundant = (lead == 0x00 && next & 0x80 == 0) || (lead == 0xFF && next & 0x80 != 0);
        if !redundant {
            break;
        }
        start += 1;
    }
    &bytes[start..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;

    fn encode(f: impl FnOnce(&mut EncodeBuf)) -> Vec<u8> {
        let mut buf = EncodeBuf::new();
        f(&mut buf);
        buf.finish().to_vec()
    }

    #[test]
    fn test_integer_minimal_form() {
        assert_eq!(encode(|b| b.push_integer(0)), [0x02, 0x01, 0x00]);
        assert_eq!(encode(|b| b.push_integer(127)), [0x02, 0x01, 0x7F]);
        assert_eq!(encode(|b| b.push_integer(128)), [0x02, 0x02, 0x00, 0x80]);
        assert_eq!(encode(|b| b.push_integer(256)), [0x02, 0x02, 0x01, 0x00]);
        assert_eq!(encode(|b| b.push_integer(-1)), [0x02, 0x01, 0xFF]);
        assert_eq!(encode(|b| b.push_integer(-128)), [0x02, 0x01, 0x80]);
        assert_eq!(encode(|b| b.push_integer(-129)), [0x02, 0x02, 0xFF, 0x7F]);
        assert_eq!(
            encode(|b| b.push_integer(i32::MIN)),
            [0x02, 0x04, 0x80, 0x00, 0x00, 0x00]
        );
        assert_eq!(
            encode(|b| b.push_integer(i32::MAX)),
            [0x02, 0x04, 0x7F, 0xFF, 0xFF, 0xFF]
        );
    }

    #[test]
    fn test_unsigned32_gets_sign_padding() {
        let counter = tag::application::COUNTER32;
        assert_eq!(encode(|b| b.push_unsigned32(counter, 0)), [0x41, 0x01, 0x00]);
        assert_eq!(
            encode(|b| b.push_unsigned32(counter, 0x80)),
            [0x41, 0x02, 0x00, 0x80]
        );
        assert_eq!(
            encode(|b| b.push_unsigned32(counter, u32::MAX)),
            [0x41, 0x05, 0x00, 0xFF, 0xFF, 0xFF, 0xFF]
        );
    }

    #[test]
    fn test_counter64() {
        assert_eq!(encode(|b| b.push_counter64(1)), [0x46, 0x01, 0x01]);
        assert_eq!(
            encode(|b| b.push_counter64(u64::MAX)),
            [0x46, 0x09, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]
        );
    }

    #[test]
    fn test_primitives() {
        assert_eq!(encode(|b| b.push_null()), [0x05, 0x00]);
        assert_eq!(
            encode(|b| b.push_octet_string(b"public")),
            [0x04, 0x06, b'p', b'u', b'b', b'l', b'i', b'c']
        );
        assert_eq!(
            encode(|b| b.push_oid(&oid!(1, 3, 6, 1))),
            [0x06, 0x03, 0x2B, 0x06, 0x01]
        );
        assert_eq!(
            encode(|b| b.push_ip_address([192, 168, 1, 1])),
            [0x40, 0x04, 192, 168, 1, 1]
        );
    }

    #[test]
    fn test_sequence_children_in_order() {
        let bytes = encode(|b| {
            b.push_sequence(|b| {
                b.push_integer(2);
                b.push_integer(1);
            })
        });
        assert_eq!(bytes, [0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x02]);
    }

    #[test]
    fn test_long_form_length_for_large_content() {
        let payload = vec![0xAB; 200];
        let bytes = encode(|b| b.push_octet_string(&payload));
        assert_eq!(&bytes[..3], &[0x04, 0x81, 200]);
        assert_eq!(bytes.len(), 203);
    }
}
