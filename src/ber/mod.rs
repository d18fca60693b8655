//! BER (Basic Encoding Rules) primitives for SNMP.
//!
//! - [`tag`] - tag constants
//! - [`length`] - short and long form lengths
//! - [`EncodeBuf`] - reverse-order encoder
//! - [`Decoder`] - bounds-checked zero-copy decoder with a [`DecodePolicy`]

mod decode;
mod encode;
pub mod length;
pub mod tag;

pub use decode::{DecodePolicy, Decoder};
pub use encode::EncodeBuf;
