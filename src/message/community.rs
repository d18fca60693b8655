//! Community-based SNMP message format (v1/v2c).

use crate::ber::{DecodePolicy, Decoder, EncodeBuf};
use crate::error::{DecodeErrorKind, Result};
use crate::pdu::Pdu;
use crate::version::Version;
use bytes::Bytes;

/// Community message (v1 or v2c).
///
/// ```
/// use snmp_manager::{message::CommunityMessage, pdu::Pdu, oid};
///
/// let msg = CommunityMessage::v2c("public", Pdu::get_request(1, &[oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)]));
/// let decoded = CommunityMessage::decode(msg.encode()).unwrap();
/// assert_eq!(decoded, msg);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommunityMessage {
    /// SNMP version
    pub version: Version,
    /// Community string, sent in cleartext
    pub community: Bytes,
    /// Protocol data unit
    pub pdu: Pdu,
}

impl CommunityMessage {
    /// Create a new community message.
    pub fn new(version: Version, community: impl Into<Bytes>, pdu: Pdu) -> Self {
        Self {
            version,
            community: community.into(),
            pdu,
        }
    }

    /// Create a v2c message.
    pub fn v2c(community: impl Into<Bytes>, pdu: Pdu) -> Self {
        Self::new(Version::V2c, community, pdu)
    }

    /// Create a v1 message.
    pub fn v1(community: impl Into<Bytes>, pdu: Pdu) -> Self {
        Self::new(Version::V1, community, pdu)
    }

    /// Encode to BER.
    pub fn encode(&self) -> Bytes {
        let mut buf = EncodeBuf::with_capacity(64 + self.community.len() + 32 * self.pdu.varbinds.len());

        buf.push_sequence(|buf| {
            self.pdu.encode(buf);
            buf.push_octet_string(&self.community);
            buf.push_integer(self.version.as_i32());
        });

        buf.finish()
    }

    /// Decode from BER with [`DecodePolicy::Strict`].
    pub fn decode(data: Bytes) -> Result<Self> {
        Self::decode_with_policy(data, DecodePolicy::Strict)
    }

    /// Decode from BER with the given policy.
    pub fn decode_with_policy(data: Bytes, policy: DecodePolicy) -> Result<Self> {
        let mut decoder = Decoder::with_policy(data, policy);
        let msg = Self::decode_from(&mut decoder)?;
        decoder.finish()?;
        Ok(msg)
    }

    pub(crate) fn decode_from(decoder: &mut Decoder) -> Result<Self> {
        let mut seq = decoder.read_sequence()?;

        let version_at = seq.offset();
        let version_num = seq.read_integer()?;
        let Some(version) = Version::from_i32(version_num) else {
            tracing::debug!(target: "snmp_manager::ber", { snmp.offset = version_at, snmp.version = version_num }, "unsupported SNMP version");
            return Err(seq.error(DecodeErrorKind::UnknownVersion(version_num)));
        };

        let community = seq.read_octet_string()?;
        let pdu = Pdu::decode(&mut seq)?;
        seq.finish()?;

        Ok(CommunityMessage {
            version,
            community,
            pdu,
        })
    }

    /// Consume and return the PDU.
    pub fn into_pdu(self) -> Pdu {
        self.pdu
    }
}
