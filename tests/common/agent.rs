//! In-process SNMP stub agent for testing.
//!
//! Serves a `BTreeMap<Oid, Value>` over a real UDP socket on an ephemeral
//! localhost port, using the crate's own codec. Stops when dropped.

use super::fixtures::{COMMUNITY_RO, COMMUNITY_RW, system_mib};

use bytes::Bytes;
use snmp_manager::{CommunityMessage, ErrorStatus, Oid, Pdu, PduType, Value, VarBind};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// What a custom hook wants done with a request.
pub enum Reply {
    /// Answer normally from the MIB.
    Default,
    /// Send these datagrams instead.
    Send(Vec<Bytes>),
    /// Send nothing.
    Drop,
}

type Hook = dyn Fn(&CommunityMessage) -> Reply + Send + Sync;

struct Shared {
    data: Mutex<BTreeMap<Oid, Value>>,
    received: Mutex<Vec<Bytes>>,
    drop_first: usize,
    count: AtomicUsize,
    hook: Option<Box<Hook>>,
}

/// An in-process SNMP agent.
///
/// ```ignore
/// let agent = TestAgent::new().await;
/// let session = Session::connect(SessionConfig::new(agent.addr().to_string())).await?;
/// assert_eq!(session.get("1.3.6.1.2.1.1.1.0").await?.as_str(), Some("Linux host"));
/// ```
pub struct TestAgent {
    addr: SocketAddr,
    shared: Arc<Shared>,
    cancel: CancellationToken,
    _task: JoinHandle<()>,
}

/// Builder for [`TestAgent`].
pub struct TestAgentBuilder {
    data: BTreeMap<Oid, Value>,
    drop_first: usize,
    hook: Option<Box<Hook>>,
}

impl TestAgentBuilder {
    /// Serve `data` instead of the system group.
    pub fn data(mut self, data: BTreeMap<Oid, Value>) -> Self {
        self.data = data;
        self
    }

    /// Silently drop the first `n` datagrams.
    pub fn drop_first(mut self, n: usize) -> Self {
        self.drop_first = n;
        self
    }

    /// Intercept requests before the MIB answers them.
    pub fn hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&CommunityMessage) -> Reply + Send + Sync + 'static,
    {
        self.hook = Some(Box::new(hook));
        self
    }

    /// Bind to an ephemeral localhost port and start serving.
    pub async fn start(self) -> TestAgent {
        let socket = UdpSocket::bind("127.0.0.1:0")
            .await
            .expect("failed to bind test agent");
        let addr = socket.local_addr().expect("local addr");
        let cancel = CancellationToken::new();
        let shared = Arc::new(Shared {
            data: Mutex::new(self.data),
            received: Mutex::new(Vec::new()),
            drop_first: self.drop_first,
            count: AtomicUsize::new(0),
            hook: self.hook,
        });

        let task = tokio::spawn(serve(socket, shared.clone(), cancel.clone()));

        TestAgent {
            addr,
            shared,
            cancel,
            _task: task,
        }
    }
}

impl TestAgent {
    /// Agent serving the system group.
    pub async fn new() -> Self {
        Self::builder().start().await
    }

    pub fn builder() -> TestAgentBuilder {
        TestAgentBuilder {
            data: system_mib(),
            drop_first: 0,
            hook: None,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Every datagram received, dropped ones included.
    pub fn received(&self) -> Vec<Bytes> {
        self.shared.received.lock().unwrap().clone()
    }

    /// Number of datagrams received.
    pub fn request_count(&self) -> usize {
        self.shared.count.load(Ordering::SeqCst)
    }

    /// Current value of `oid`.
    pub fn value(&self, oid: &Oid) -> Option<Value> {
        self.shared.data.lock().unwrap().get(oid).cloned()
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

impl Drop for TestAgent {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn serve(socket: UdpSocket, shared: Arc<Shared>, cancel: CancellationToken) {
    let mut buf = vec![0u8; 65535];
    loop {
        let (len, source) = tokio::select! {
            _ = cancel.cancelled() => return,
            received = socket.recv_from(&mut buf) => match received {
                Ok(r) => r,
                Err(_) => continue,
            },
        };

        let data = Bytes::copy_from_slice(&buf[..len]);
        shared.received.lock().unwrap().push(data.clone());
        let seen = shared.count.fetch_add(1, Ordering::SeqCst) + 1;
        if seen <= shared.drop_first {
            continue;
        }

        let Ok(request) = CommunityMessage::decode(data) else {
            continue;
        };

        let replies = match shared.hook.as_ref().map(|hook| hook(&request)) {
            Some(Reply::Send(replies)) => replies,
            Some(Reply::Drop) => Vec::new(),
            Some(Reply::Default) | None => answer(&shared, &request).into_iter().collect(),
        };

        for reply in replies {
            let _ = socket.send_to(&reply, source).await;
        }
    }
}

/// Answer a request from the MIB. Unknown communities get no reply.
fn answer(shared: &Shared, request: &CommunityMessage) -> Option<Bytes> {
    let community = &request.community[..];
    let writable = community == COMMUNITY_RW.as_bytes();
    if !writable && community != COMMUNITY_RO.as_bytes() {
        return None;
    }

    let pdu = &request.pdu;
    let mut data = shared.data.lock().unwrap();
    let response = match pdu.pdu_type {
        PduType::GetRequest => {
            let varbinds = pdu
                .varbinds
                .iter()
                .map(|vb| {
                    let value = data.get(&vb.oid).cloned().unwrap_or(Value::NoSuchObject);
                    VarBind::new(vb.oid.clone(), value)
                })
                .collect();
            Pdu::response(pdu.request_id, ErrorStatus::NoError, 0, varbinds)
        }
        PduType::GetNextRequest => {
            let varbinds = pdu.varbinds.iter().map(|vb| successor(&data, &vb.oid)).collect();
            Pdu::response(pdu.request_id, ErrorStatus::NoError, 0, varbinds)
        }
        PduType::GetBulkRequest => {
            let non_repeaters = (pdu.error_status.max(0) as usize).min(pdu.varbinds.len());
            let max_repetitions = pdu.error_index.max(0) as usize;
            let (scalars, columns) = pdu.varbinds.split_at(non_repeaters);

            let mut varbinds: Vec<VarBind> = scalars.iter().map(|vb| successor(&data, &vb.oid)).collect();
            let mut cursors: Vec<Oid> = columns.iter().map(|vb| vb.oid.clone()).collect();
            for _ in 0..max_repetitions {
                if cursors.is_empty() {
                    break;
                }
                for cursor in cursors.iter_mut() {
                    let next = successor(&data, cursor);
                    *cursor = next.oid.clone();
                    varbinds.push(next);
                }
            }
            Pdu::response(pdu.request_id, ErrorStatus::NoError, 0, varbinds)
        }
        PduType::SetRequest if !writable => {
            Pdu::response(pdu.request_id, ErrorStatus::NoAccess, 1, pdu.varbinds.clone())
        }
        PduType::SetRequest => {
            for vb in &pdu.varbinds {
                data.insert(vb.oid.clone(), vb.value.clone());
            }
            Pdu::response(pdu.request_id, ErrorStatus::NoError, 0, pdu.varbinds.clone())
        }
        PduType::Response => return None,
    };

    Some(CommunityMessage::new(request.version, request.community.clone(), response).encode())
}

fn successor(data: &BTreeMap<Oid, Value>, oid: &Oid) -> VarBind {
    use std::ops::Bound;
    match data
        .range((Bound::Excluded(oid.clone()), Bound::Unbounded))
        .next()
    {
        Some((next, value)) => VarBind::new(next.clone(), value.clone()),
        None => VarBind::new(oid.clone(), Value::EndOfMibView),
    }
}
