//! SNMP message wrapper.
//!
//! A community message is the outer envelope of every v1/v2c datagram:
//! `SEQUENCE { version INTEGER, community OCTET STRING, pdu PDU }`.

mod community;

pub use community::CommunityMessage;
