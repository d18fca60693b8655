//! Transport layer abstraction.
//!
//! A [`Transport`] moves whole datagrams between the manager and any number
//! of agents. It does no correlation: the [`Client`](crate::Client)
//! dispatcher reads every datagram and routes it by request-id.

mod udp;

#[cfg(any(test, feature = "testing"))]
mod mock;

pub use udp::*;

#[cfg(any(test, feature = "testing"))]
pub use mock::*;

use crate::error::{Error, Result, UNKNOWN_TARGET};
use bytes::Bytes;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

/// Datagram transport shared by every request of a client.
///
/// Implementations use interior mutability and are driven concurrently:
/// callers send while the client's dispatcher task sits in
/// [`recv_from`](Transport::recv_from).
pub trait Transport: Send + Sync + 'static {
    /// Send one datagram to `target`.
    ///
    /// Fails with [`Error::Network`] on socket failure or once the transport
    /// has been closed.
    fn send_to(&self, data: &[u8], target: SocketAddr) -> impl Future<Output = Result<()>> + Send;

    /// Receive the next datagram from any source.
    ///
    /// Fails with [`Error::Network`] of kind `NotConnected` once the
    /// transport has been closed.
    fn recv_from(&self) -> impl Future<Output = Result<(Bytes, SocketAddr)>> + Send;

    /// Receive with a deadline, failing with [`Error::Timeout`] on expiry.
    fn recv_timeout(
        &self,
        timeout: Duration,
    ) -> impl Future<Output = Result<(Bytes, SocketAddr)>> + Send {
        async move {
            match tokio::time::timeout(timeout, self.recv_from()).await {
                Ok(result) => result,
                Err(_) => Err(Error::Timeout {
                    target: UNKNOWN_TARGET,
                    elapsed: timeout,
                    retries: 0,
                }
                .boxed()),
            }
        }
    }

    /// Local bind address.
    fn local_addr(&self) -> SocketAddr;

    /// Stop sending and wake any pending receive with an error.
    fn close(&self) {}
}

/// Error returned by transports after [`Transport::close`].
pub(crate) fn closed_error(target: SocketAddr) -> Box<Error> {
    Error::Network {
        target,
        source: std::io::Error::new(std::io::ErrorKind::NotConnected, "transport closed"),
    }
    .boxed()
}

/// Find the request-id of a v1/v2c message without decoding the whole message.
///
/// Walks `SEQUENCE { INTEGER version, OCTET STRING community, PDU { INTEGER
/// request-id, .. } }` and reads the first INTEGER inside the PDU. Anything
/// that does not have that shape yields `None`.
pub(crate) fn extract_request_id(data: &[u8]) -> Option<i32> {
    let mut scan = Scan { data, pos: 0 };

    scan.header(0x30)?;

    let version_len = scan.header(0x02)?;
    scan.skip(version_len)?;

    let community_len = scan.header(0x04)?;
    scan.skip(community_len)?;

    let pdu_tag = *data.get(scan.pos)?;
    if !(0xA0..=0xA8).contains(&pdu_tag) {
        return None;
    }
    scan.header(pdu_tag)?;

    let id_len = scan.header(0x02)?;
    if id_len == 0 || id_len > 4 {
        return None;
    }
    let bytes = data.get(scan.pos..scan.pos + id_len)?;

    let init: i32 = if bytes[0] & 0x80 != 0 { -1 } else { 0 };
    Some(bytes.iter().fold(init, |acc, &b| (acc << 8) | b as i32))
}

struct Scan<'a> {
    data: &'a [u8],
    pos: usize,
}

impl Scan<'_> {
    /// Consume a tag and its length, returning the length.
    fn header(&mut self, tag: u8) -> Option<usize> {
        if *self.data.get(self.pos)? != tag {
            return None;
        }
        self.pos += 1;

        let first = *self.data.get(self.pos)?;
        self.pos += 1;
        if first < 0x80 {
            return Some(first as usize);
        }

        let octets = (first & 0x7F) as usize;
        if octets == 0 || octets > 4 {
            return None;
        }
        let bytes = self.data.get(self.pos..self.pos + octets)?;
        self.pos += octets;
        Some(bytes.iter().fold(0usize, |acc, &b| (acc << 8) | b as usize))
    }

    fn skip(&mut self, len: usize) -> Option<()> {
        let end = self.pos.checked_add(len)?;
        if end > self.data.len() {
            return None;
        }
        self.pos = end;
        Some(())
    }
}
