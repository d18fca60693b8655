//! Mock transport for testing.
//!
//! An in-memory agent: each datagram sent through the transport is decoded
//! and handed to a responder closure, whose replies are queued for
//! [`Transport::recv_from`].

use super::{Transport, closed_error, extract_request_id};
use crate::error::{ErrorStatus, Result};
use crate::message::CommunityMessage;
use crate::oid::Oid;
use crate::pdu::{Pdu, PduType};
use crate::value::Value;
use crate::varbind::VarBind;
use crate::version::Version;
use bytes::Bytes;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

type Responder = dyn Fn(&CommunityMessage) -> Vec<Bytes> + Send + Sync;

/// A datagram sent through the mock transport.
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    /// The raw request data
    pub data: Bytes,
    /// Destination address
    pub target: SocketAddr,
    /// The request ID found in the message, if any
    pub request_id: Option<i32>,
}

/// Mock transport for testing SNMP client functionality.
///
/// ```rust
/// use snmp_manager::transport::{MockTransport, ResponseBuilder};
/// use snmp_manager::{Value, oid};
///
/// let mock = MockTransport::new(|request| {
///     vec![
///         ResponseBuilder::for_request(request)
///             .varbind(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), Value::from("Linux host"))
///             .build(),
///     ]
/// })
/// .drop_first(1);
/// assert!(mock.requests().is_empty());
/// ```
#[derive(Clone)]
pub struct MockTransport {
    inner: Arc<MockTransportInner>,
}

struct MockTransportInner {
    responder: Box<Responder>,
    state: Mutex<MockState>,
    tx: mpsc::UnboundedSender<(Bytes, SocketAddr)>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<(Bytes, SocketAddr)>>,
    closed: CancellationToken,
}

#[derive(Default)]
struct MockState {
    requests: Vec<RecordedRequest>,
    drop_remaining: usize,
}

impl MockTransport {
    /// Create a mock answering each decoded request with `responder`'s datagrams.
    ///
    /// Replies appear to come from the address the request was sent to.
    /// Requests that fail to decode are recorded and get no reply.
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&CommunityMessage) -> Vec<Bytes> + Send + Sync + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(MockTransportInner {
                responder: Box::new(responder),
                state: Mutex::new(MockState::default()),
                tx,
                rx: tokio::sync::Mutex::new(rx),
                closed: CancellationToken::new(),
            }),
        }
    }

    /// Silently drop the first `count` requests, as a lossy network would.
    pub fn drop_first(self, count: usize) -> Self {
        self.inner.state.lock().unwrap().drop_remaining = count;
        self
    }

    /// All datagrams sent so far, dropped ones included.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.inner.state.lock().unwrap().requests.clone()
    }

    /// Number of datagrams sent so far.
    pub fn request_count(&self) -> usize {
        self.inner.state.lock().unwrap().requests.len()
    }

    /// Deliver an unsolicited datagram to the receiver.
    pub fn inject(&self, data: impl Into<Bytes>, source: SocketAddr) {
        let _ = self.inner.tx.send((data.into(), source));
    }
}

impl Transport for MockTransport {
    async fn send_to(&self, data: &[u8], target: SocketAddr) -> Result<()> {
        if self.inner.closed.is_cancelled() {
            return Err(closed_error(target));
        }

        let data = Bytes::copy_from_slice(data);
        let dropped = {
            let mut state = self.inner.state.lock().unwrap();
            state.requests.push(RecordedRequest {
                data: data.clone(),
                target,
                request_id: extract_request_id(&data),
            });
            if state.drop_remaining > 0 {
                state.drop_remaining -= 1;
                true
            } else {
                false
            }
        };

        if dropped {
            tracing::trace!(target: "snmp_manager::transport", { snmp.target = %target }, "mock dropped request");
            return Ok(());
        }

        match CommunityMessage::decode(data) {
            Ok(request) => {
                for reply in (self.inner.responder)(&request) {
                    let _ = self.inner.tx.send((reply, target));
                }
            }
            Err(e) => {
                tracing::debug!(target: "snmp_manager::transport", { error = %e }, "mock received undecodable request");
            }
        }
        Ok(())
    }

    async fn recv_from(&self) -> Result<(Bytes, SocketAddr)> {
        let mut rx = self.inner.rx.lock().await;
        tokio::select! {
            _ = self.inner.closed.cancelled() => Err(closed_error(self.local_addr())),
            received = rx.recv() => match received {
                Some(datagram) => Ok(datagram),
                None => Err(closed_error(self.local_addr())),
            },
        }
    }

    fn local_addr(&self) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 0))
    }

    fn close(&self) {
        self.inner.closed.cancel();
    }
}

/// Builder for creating SNMP response messages for testing.
pub struct ResponseBuilder {
    version: Version,
    community: Bytes,
    request_id: i32,
    varbinds: Vec<VarBind>,
    error_status: i32,
    error_index: i32,
}

impl ResponseBuilder {
    /// Start a v2c "public" response with the given request ID.
    pub fn new(request_id: i32) -> Self {
        Self {
            version: Version::V2c,
            community: Bytes::from_static(b"public"),
            request_id,
            varbinds: Vec::new(),
            error_status: 0,
            error_index: 0,
        }
    }

    /// Start a response echoing the request's version, community and request ID.
    pub fn for_request(request: &CommunityMessage) -> Self {
        Self {
            version: request.version,
            community: request.community.clone(),
            ..Self::new(request.pdu.request_id)
        }
    }

    /// Override the request ID.
    pub fn request_id(mut self, request_id: i32) -> Self {
        self.request_id = request_id;
        self
    }

    /// Override the version.
    pub fn version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    /// Add a varbind to the response.
    pub fn varbind(mut self, oid: Oid, value: Value) -> Self {
        self.varbinds.push(VarBind::new(oid, value));
        self
    }

    /// Add several varbinds.
    pub fn varbinds(mut self, varbinds: impl IntoIterator<Item = VarBind>) -> Self {
        self.varbinds.extend(varbinds);
        self
    }

    /// Set error status and 1-based error index.
    pub fn error(mut self, status: ErrorStatus, index: i32) -> Self {
        self.error_status = status.as_i32();
        self.error_index = index;
        self
    }

    /// Build the response PDU.
    pub fn pdu(self) -> Pdu {
        Pdu {
            pdu_type: PduType::Response,
            request_id: self.request_id,
            error_status: self.error_status,
            error_index: self.error_index,
            varbinds: self.varbinds,
        }
    }

    /// Build the encoded message.
    pub fn build(self) -> Bytes {
        let version = self.version;
        let community = self.community.clone();
        CommunityMessage::new(version, community, self.pdu()).encode()
    }
}
