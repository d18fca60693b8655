//! # snmp-manager
//!
//! Async SNMPv2c manager core for Rust.
//!
//! ## Features
//!
//! - BER codec for SNMPv2c messages with a strict/lenient decode policy
//! - One shared UDP socket for any number of agents, with replies routed by
//!   request-id
//! - Per-request timeout and retransmission with configurable backoff
//! - GET, GETNEXT, GETBULK and SET, plus lazy subtree walks as a `Stream`
//! - A string-oriented [`Session`] for the common one-agent case
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use snmp_manager::{Session, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() -> snmp_manager::Result<()> {
//!     let session = Session::connect(SessionConfig::new("192.0.2.10")).await?;
//!
//!     let descr = session.get("1.3.6.1.2.1.1.1.0").await?;
//!     println!("sysDescr: {descr}");
//!
//!     for vb in session.walk("1.3.6.1.2.1.1")?.collect().await? {
//!         println!("{vb}");
//!     }
//!
//!     session.close();
//!     Ok(())
//! }
//! ```
//!
//! ## Engine
//!
//! [`Client`] takes an explicit [`Target`] per call, so one client (and one
//! socket) can poll many agents concurrently:
//!
//! ```rust,no_run
//! use snmp_manager::{Client, ClientConfig, Target, oid};
//!
//! # async fn example() -> snmp_manager::Result<()> {
//! let client = Client::bind(ClientConfig::default()).await?;
//! let a = Target::builder("192.0.2.10").build()?;
//! let b = Target::builder("192.0.2.11").build()?;
//!
//! let sys_name = oid!(1, 3, 6, 1, 2, 1, 1, 5, 0);
//! let (ra, rb) = tokio::join!(
//!     client.get(&a, std::slice::from_ref(&sys_name)),
//!     client.get(&b, std::slice::from_ref(&sys_name)),
//! );
//! # let _ = (ra?, rb?);
//! # Ok(())
//! # }
//! ```

pub mod ber;
pub mod client;
pub mod error;
pub mod message;
pub mod oid;
pub mod pdu;
pub mod session;
pub mod transport;
pub mod value;
pub mod varbind;
pub mod version;

pub(crate) mod util;

pub use ber::DecodePolicy;
pub use client::{
    Backoff, Client, ClientConfig, OidOrdering, Retry, RetryBuilder, Target, TargetBuilder, Walk,
    WalkMode,
};
pub use error::{
    DecodeErrorKind, Error, ErrorStatus, OidErrorKind, ProtocolErrorKind, Result, WalkAbortReason,
};
pub use message::CommunityMessage;
pub use oid::Oid;
pub use pdu::{Pdu, PduType};
pub use session::{Session, SessionConfig};
pub use transport::{Transport, UdpTransport};
pub use value::Value;
pub use varbind::VarBind;
pub use version::Version;

/// The full v1/v2c message; the only message format this crate speaks.
pub type Message = CommunityMessage;

/// Testing utilities exposed via the `testing` feature.
#[cfg(feature = "testing")]
pub mod testing {
    pub use crate::transport::{MockTransport, RecordedRequest, ResponseBuilder};
    pub use crate::util::{HexDecodeError, decode_hex, encode_hex};
}
