//! SNMP value types.
//!
//! The `Value` enum represents all SNMPv2c data types including the three
//! exception values an agent may return in place of data.

use crate::ber::{DecodePolicy, Decoder, EncodeBuf, tag};
use crate::error::{DecodeErrorKind, Result};
use crate::oid::Oid;
use crate::util::encode_hex;
use bytes::Bytes;

/// SNMP value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// INTEGER / Integer32 (signed 32-bit)
    Integer(i32),

    /// OCTET STRING (arbitrary bytes)
    OctetString(Bytes),

    /// NULL, the placeholder value in GET and GETNEXT requests
    Null,

    /// OBJECT IDENTIFIER
    ObjectIdentifier(Oid),

    /// IpAddress (4 bytes, network order)
    IpAddress([u8; 4]),

    /// Counter32 (unsigned 32-bit, wrapping)
    Counter32(u32),

    /// Gauge32 / Unsigned32 (unsigned 32-bit, non-wrapping)
    Gauge32(u32),

    /// TimeTicks (hundredths of a second)
    TimeTicks(u32),

    /// Opaque (arbitrary BER-wrapped bytes)
    Opaque(Bytes),

    /// Counter64 (unsigned 64-bit, wrapping)
    Counter64(u64),

    /// noSuchObject exception: the agent does not implement this object.
    NoSuchObject,

    /// noSuchInstance exception: the object exists but this instance does not.
    NoSuchInstance,

    /// endOfMibView exception: nothing follows the requested OID.
    ///
    /// This is the normal termination condition for a walk.
    ///
    /// ```
    /// use snmp_manager::Value;
    ///
    /// assert!(Value::EndOfMibView.is_exception());
    /// ```
    EndOfMibView,
}

impl Value {
    /// Try to get as i32.
    ///
    /// ```
    /// use snmp_manager::Value;
    ///
    /// assert_eq!(Value::Integer(-100).as_i32(), Some(-100));
    /// assert_eq!(Value::Counter32(42).as_i32(), None);
    /// ```
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as u32.
    ///
    /// Works for Counter32, Gauge32, TimeTicks and non-negative Integer.
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::Counter32(v) | Value::Gauge32(v) | Value::TimeTicks(v) => Some(*v),
            Value::Integer(v) => u32::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Try to get as u64.
    ///
    /// Works for Counter64 and everything [`as_u32`](Self::as_u32) accepts.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Counter64(v) => Some(*v),
            other => other.as_u32().map(u64::from),
        }
    }

    /// Try to get as bytes (OctetString or Opaque).
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::OctetString(v) | Value::Opaque(v) => Some(v),
            _ => None,
        }
    }

    /// Try to get as UTF-8 text.
    ///
    /// ```
    /// use snmp_manager::Value;
    ///
    /// let v = Value::from("Linux host");
    /// assert_eq!(v.as_str(), Some("Linux host"));
    /// assert_eq!(Value::OctetString(vec![0xFF, 0xFE].into()).as_str(), None);
    /// ```
    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }

    /// Try to get as OID.
    pub fn as_oid(&self) -> Option<&Oid> {
        match self {
            Value::ObjectIdentifier(oid) => Some(oid),
            _ => None,
        }
    }

    /// Try to get as IP address.
    pub fn as_ip(&self) -> Option<std::net::Ipv4Addr> {
        match self {
            Value::IpAddress(bytes) => Some(std::net::Ipv4Addr::from(*bytes)),
            _ => None,
        }
    }

    /// Check if this is an exception value.
    pub fn is_exception(&self) -> bool {
        matches!(
            self,
            Value::NoSuchObject | Value::NoSuchInstance | Value::EndOfMibView
        )
    }

    /// Encode to BER.
    pub fn encode(&self, buf: &mut EncodeBuf) {
        match self {
            Value::Integer(v) => buf.push_integer(*v),
            Value::OctetString(data) => buf.push_octet_string(data),
            Value::Null => buf.push_null(),
            Value::ObjectIdentifier(oid) => buf.push_oid(oid),
            Value::IpAddress(addr) => buf.push_ip_address(*addr),
            Value::Counter32(v) => buf.push_unsigned32(tag::application::COUNTER32, *v),
            Value::Gauge32(v) => buf.push_unsigned32(tag::application::GAUGE32, *v),
            Value::TimeTicks(v) => buf.push_unsigned32(tag::application::TIMETICKS, *v),
            Value::Opaque(data) => {
                buf.push_bytes(data);
                buf.push_length(data.len());
                buf.push_tag(tag::application::OPAQUE);
            }
            Value::Counter64(v) => buf.push_counter64(*v),
            Value::NoSuchObject => push_exception(buf, tag::exception::NO_SUCH_OBJECT),
            Value::NoSuchInstance => push_exception(buf, tag::exception::NO_SUCH_INSTANCE),
            Value::EndOfMibView => push_exception(buf, tag::exception::END_OF_MIB_VIEW),
        }
    }

    /// Decode from BER.
    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let at = decoder.offset();
        let tag = decoder.read_tag()?;
        let len = decoder.read_length()?;

        let value = match tag {
            tag::universal::INTEGER => Value::Integer(decoder.read_integer_value(len)?),
            tag::universal::OCTET_STRING => Value::OctetString(decoder.read_bytes(len)?),
            tag::universal::NULL => {
                decoder.read_null_value(len)?;
                Value::Null
            }
            tag::universal::OBJECT_IDENTIFIER => {
                Value::ObjectIdentifier(decoder.read_oid_value(len)?)
            }
            tag::application::IP_ADDRESS => Value::IpAddress(decoder.read_ip_address_value(len)?),
            tag::application::COUNTER32 => Value::Counter32(decoder.read_unsigned32_value(len)?),
            tag::application::GAUGE32 => Value::Gauge32(decoder.read_unsigned32_value(len)?),
            tag::application::TIMETICKS => Value::TimeTicks(decoder.read_unsigned32_value(len)?),
            tag::application::OPAQUE => Value::Opaque(decoder.read_bytes(len)?),
            tag::application::COUNTER64 => Value::Counter64(decoder.read_counter64_value(len)?),
            tag::exception::NO_SUCH_OBJECT => {
                read_exception_content(decoder, len)?;
                Value::NoSuchObject
            }
            tag::exception::NO_SUCH_INSTANCE => {
                read_exception_content(decoder, len)?;
                Value::NoSuchInstance
            }
            tag::exception::END_OF_MIB_VIEW => {
                read_exception_content(decoder, len)?;
                Value::EndOfMibView
            }
            tag::universal::OCTET_STRING_CONSTRUCTED => {
                return Err(decoder.error(DecodeErrorKind::ConstructedOctetString));
            }
            other => {
                tracing::debug!(target: "snmp_manager::ber", { snmp.offset = at, snmp.tag = other }, "unknown value tag");
                return Err(decoder.error(DecodeErrorKind::UnknownValueTag(other)));
            }
        };
        Ok(value)
    }
}

fn push_exception(buf: &mut EncodeBuf, tag: u8) {
    buf.push_length(0);
    buf.push_tag(tag);
}

/// Exceptions are NULL-typed; some agents pad them anyway.
fn read_exception_content(decoder: &mut Decoder, len: usize) -> Result<()> {
    if len != 0 && decoder.policy() == DecodePolicy::Lenient {
        decoder.read_bytes(len)?;
        return Ok(());
    }
    decoder.read_null_value(len)
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{}", v),
            Value::OctetString(data) => match std::str::from_utf8(data) {
                Ok(s) if !s.chars().any(|c| c.is_control() && !c.is_whitespace()) => {
                    write!(f, "{}", s)
                }
                _ => write!(f, "0x{}", encode_hex(data)),
            },
            Value::Null => write!(f, "NULL"),
            Value::ObjectIdentifier(oid) => write!(f, "{}", oid),
            Value::IpAddress(addr) => {
                write!(f, "{}", std::net::Ipv4Addr::from(*addr))
            }
            Value::Counter32(v) | Value::Gauge32(v) => write!(f, "{}", v),
            Value::TimeTicks(v) => {
                let secs = v / 100;
                let days = secs / 86400;
                let hours = (secs % 86400) / 3600;
                let mins = (secs % 3600) / 60;
                let s = secs % 60;
                write!(f, "{}d {}h {}m {}s", days, hours, mins, s)
            }
            Value::Opaque(data) => write!(f, "Opaque(0x{})", encode_hex(data)),
            Value::Counter64(v) => write!(f, "{}", v),
            Value::NoSuchObject => write!(f, "noSuchObject"),
            Value::NoSuchInstance => write!(f, "noSuchInstance"),
            Value::EndOfMibView => write!(f, "endOfMibView"),
        }
    }
}

/// Convenience conversions for creating [`Value`] from common Rust types.
///
/// ```
/// use snmp_manager::Value;
/// use std::net::Ipv4Addr;
///
/// assert_eq!(Value::from(42), Value::Integer(42));
/// assert_eq!(Value::from("admin@example.com").as_str(), Some("admin@example.com"));
/// assert_eq!(Value::from(10_000_000_000u64).as_u64(), Some(10_000_000_000));
/// assert_eq!(Value::from(Ipv4Addr::new(10, 0, 0, 1)), Value::IpAddress([10, 0, 0, 1]));
/// ```
impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::OctetString(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::OctetString(Bytes::from(s))
    }
}

impl From<&[u8]> for Value {
    fn from(data: &[u8]) -> Self {
        Value::OctetString(Bytes::copy_from_slice(data))
    }
}

impl From<Bytes> for Value {
    fn from(data: Bytes) -> Self {
        Value::OctetString(data)
    }
}

impl From<Oid> for Value {
    fn from(oid: Oid) -> Self {
        Value::ObjectIdentifier(oid)
    }
}

impl From<std::net::Ipv4Addr> for Value {
    fn from(addr: std::net::Ipv4Addr) -> Self {
        Value::IpAddress(addr.octets())
    }
}

impl From<[u8; 4]> for Value {
    fn from(addr: [u8; 4]) -> Self {
        Value::IpAddress(addr)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Counter64(v)
    }
}
