//! SNMP Protocol Data Units (PDUs).
//!
//! The PDU type is a closed set: the four request kinds a manager sends and
//! the Response it receives. Trap, inform and report PDUs fail to decode.

use crate::ber::{Decoder, EncodeBuf, tag};
use crate::error::{DecodeErrorKind, ErrorStatus, Result};
use crate::oid::Oid;
use crate::varbind::{VarBind, decode_varbind_list, encode_varbind_list};

/// PDU type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PduType {
    /// GET request
    GetRequest = tag::pdu::GET_REQUEST,
    /// GETNEXT request
    GetNextRequest = tag::pdu::GET_NEXT_REQUEST,
    /// Response
    Response = tag::pdu::RESPONSE,
    /// SET request
    SetRequest = tag::pdu::SET_REQUEST,
    /// GETBULK request (v2c)
    GetBulkRequest = tag::pdu::GET_BULK_REQUEST,
}

impl PduType {
    /// Create from tag byte.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            tag::pdu::GET_REQUEST => Some(Self::GetRequest),
            tag::pdu::GET_NEXT_REQUEST => Some(Self::GetNextRequest),
            tag::pdu::RESPONSE => Some(Self::Response),
            tag::pdu::SET_REQUEST => Some(Self::SetRequest),
            tag::pdu::GET_BULK_REQUEST => Some(Self::GetBulkRequest),
            _ => None,
        }
    }

    /// Get the tag byte.
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Whether a manager sends this PDU type.
    pub fn is_request(self) -> bool {
        !matches!(self, Self::Response)
    }
}

impl std::fmt::Display for PduType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GetRequest => write!(f, "GetRequest"),
            Self::GetNextRequest => write!(f, "GetNextRequest"),
            Self::Response => write!(f, "Response"),
            Self::SetRequest => write!(f, "SetRequest"),
            Self::GetBulkRequest => write!(f, "GetBulkRequest"),
        }
    }
}

/// Generic PDU structure.
///
/// For [`PduType::GetBulkRequest`] the `error_status` and `error_index`
/// slots carry non-repeaters and max-repetitions; use
/// [`non_repeaters`](Self::non_repeaters) and
/// [`max_repetitions`](Self::max_repetitions) to read them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pdu {
    /// PDU type
    pub pdu_type: PduType,
    /// Request ID for correlating requests and responses
    pub request_id: i32,
    /// Error status (0 for requests)
    pub error_status: i32,
    /// 1-based index of the binding that caused the error (0 if none)
    pub error_index: i32,
    /// Variable bindings
    pub varbinds: Vec<VarBind>,
}

impl Pdu {
    /// Create a GET request.
    pub fn get_request(request_id: i32, oids: &[Oid]) -> Self {
        Self::request(PduType::GetRequest, request_id, null_varbinds(oids))
    }

    /// Create a GETNEXT request.
    pub fn get_next_request(request_id: i32, oids: &[Oid]) -> Self {
        Self::request(PduType::GetNextRequest, request_id, null_varbinds(oids))
    }

    /// Create a SET request.
    pub fn set_request(request_id: i32, varbinds: Vec<VarBind>) -> Self {
        Self::request(PduType::SetRequest, request_id, varbinds)
    }

    /// Create a GETBULK request.
    pub fn get_bulk(
        request_id: i32,
        non_repeaters: i32,
        max_repetitions: i32,
        oids: &[Oid],
    ) -> Self {
        Self {
            pdu_type: PduType::GetBulkRequest,
            request_id,
            error_status: non_repeaters,
            error_index: max_repetitions,
            varbinds: null_varbinds(oids),
        }
    }

    /// Create a Response.
    pub fn response(
        request_id: i32,
        error_status: ErrorStatus,
        error_index: i32,
        varbinds: Vec<VarBind>,
    ) -> Self {
        Self {
            pdu_type: PduType::Response,
            request_id,
            error_status: error_status.as_i32(),
            error_index,
            varbinds,
        }
    }

    fn request(pdu_type: PduType, request_id: i32, varbinds: Vec<VarBind>) -> Self {
        Self {
            pdu_type,
            request_id,
            error_status: 0,
            error_index: 0,
            varbinds,
        }
    }

    /// Non-repeaters of a GETBULK request.
    pub fn non_repeaters(&self) -> Option<i32> {
        (self.pdu_type == PduType::GetBulkRequest).then_some(self.error_status)
    }

    /// Max-repetitions of a GETBULK request.
    pub fn max_repetitions(&self) -> Option<i32> {
        (self.pdu_type == PduType::GetBulkRequest).then_some(self.error_index)
    }

    /// Encode to BER.
    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_constructed(self.pdu_type.tag(), |buf| {
            encode_varbind_list(buf, &self.varbinds);
            buf.push_integer(self.error_index);
            buf.push_integer(self.error_status);
            buf.push_integer(self.request_id);
        });
    }

    /// Decode from BER.
    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let at = decoder.offset();
        let tag = decoder.read_tag()?;
        let Some(pdu_type) = PduType::from_tag(tag) else {
            tracing::debug!(target: "snmp_manager::ber", { snmp.offset = at, snmp.pdu_tag = tag }, "unsupported PDU type");
            return Err(decoder.error(DecodeErrorKind::UnknownPduType(tag)));
        };

        let len = decoder.read_length()?;
        let mut pdu = decoder.sub_decoder(len)?;

        let request_id = pdu.read_integer()?;
        let error_status = pdu.read_integer()?;
        let error_index = pdu.read_integer()?;
        let varbinds = decode_varbind_list(&mut pdu)?;
        pdu.finish()?;

        Ok(Pdu {
            pdu_type,
            request_id,
            error_status,
            error_index,
            varbinds,
        })
    }

    /// Check if this is an error response.
    pub fn is_error(&self) -> bool {
        self.pdu_type == PduType::Response && self.error_status != 0
    }

    /// Get the error status as an enum.
    pub fn error_status_enum(&self) -> ErrorStatus {
        ErrorStatus::from_i32(self.error_status)
    }
}

fn null_varbinds(oids: &[Oid]) -> Vec<VarBind> {
    oids.iter().map(|oid| VarBind::null(oid.clone())).collect()
}
