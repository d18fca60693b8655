//! SNMP client implementation.
//!
//! A [`Client`] owns one transport, one pending-request table and one
//! dispatcher task. Every request names its [`Target`] explicitly, so a
//! single client can talk to any number of agents over the same socket.

mod pending;
mod retry;
mod target;
mod walk;

pub use retry::{Backoff, Retry, RetryBuilder};
pub use target::{DEFAULT_PORT, DEFAULT_TIMEOUT, Target, TargetBuilder};
pub use walk::{OidOrdering, Walk, WalkMode};

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{Span, instrument};

use crate::ber::DecodePolicy;
use crate::error::{Error, ErrorStatus, ProtocolErrorKind, Result};
use crate::message::CommunityMessage;
use crate::oid::Oid;
use crate::pdu::{Pdu, PduType};
use crate::transport::{DEFAULT_MAX_MESSAGE_SIZE, Transport, UdpTransport, closed_error, extract_request_id};
use crate::varbind::VarBind;
use pending::PendingTable;

/// Default max-repetitions for GETBULK walks.
pub const DEFAULT_MAX_REPETITIONS: u32 = 25;

/// Client-wide settings. Per-agent settings live on [`Target`].
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// How strictly responses are decoded (default: Strict)
    pub decode_policy: DecodePolicy,
    /// Walk request type (default: GetNext)
    pub walk_mode: WalkMode,
    /// OID ordering check during walks (default: Strict)
    pub oid_ordering: OidOrdering,
    /// Cap on bindings yielded by one walk (default: unlimited)
    pub max_walk_results: Option<usize>,
    /// Max-repetitions for GETBULK walks (default: 25)
    pub max_repetitions: u32,
    /// Receive buffer for transports the client binds itself (default: 65535)
    pub max_message_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            decode_policy: DecodePolicy::Strict,
            walk_mode: WalkMode::GetNext,
            oid_ordering: OidOrdering::Strict,
            max_walk_results: None,
            max_repetitions: DEFAULT_MAX_REPETITIONS,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

impl ClientConfig {
    /// Set the decode policy.
    pub fn decode_policy(mut self, policy: DecodePolicy) -> Self {
        self.decode_policy = policy;
        self
    }

    /// Set the walk mode.
    pub fn walk_mode(mut self, mode: WalkMode) -> Self {
        self.walk_mode = mode;
        self
    }

    /// Set the walk OID ordering check.
    pub fn oid_ordering(mut self, ordering: OidOrdering) -> Self {
        self.oid_ordering = ordering;
        self
    }

    /// Cap the number of bindings a walk yields.
    pub fn max_walk_results(mut self, limit: usize) -> Self {
        self.max_walk_results = Some(limit);
        self
    }

    /// Set max-repetitions for GETBULK walks.
    pub fn max_repetitions(mut self, max: u32) -> Self {
        self.max_repetitions = max;
        self
    }

    /// Set the receive buffer size.
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }
}

/// SNMP manager client.
///
/// Cheap to clone; clones share the socket, the pending table and the
/// dispatcher task. Dropping the last clone stops the dispatcher.
///
/// ```rust,no_run
/// use snmp_manager::{Client, ClientConfig, Target, oid};
///
/// # async fn example() -> snmp_manager::Result<()> {
/// let client = Client::bind(ClientConfig::default()).await?;
/// let target = Target::builder("192.0.2.10").community("public").build()?;
///
/// let varbinds = client.get(&target, &[oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)]).await?;
/// println!("{}", varbinds[0]);
/// # Ok(())
/// # }
/// ```
pub struct Client<T: Transport = UdpTransport> {
    inner: Arc<ClientInner<T>>,
}

impl<T: Transport> Clone for Client<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct ClientInner<T: Transport> {
    transport: Arc<T>,
    config: ClientConfig,
    pending: Arc<PendingTable>,
    shutdown: CancellationToken,
}

impl<T: Transport> Drop for ClientInner<T> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl Client<UdpTransport> {
    /// Bind an IPv4 UDP socket on an ephemeral port and start the client.
    pub async fn bind(config: ClientConfig) -> Result<Self> {
        Self::bind_to(SocketAddr::from(([0, 0, 0, 0], 0)), config).await
    }

    /// Bind a UDP socket on `addr` and start the client.
    pub async fn bind_to(addr: SocketAddr, config: ClientConfig) -> Result<Self> {
        let transport = UdpTransport::bind_with(addr, config.max_message_size).await?;
        Ok(Self::new(transport, config))
    }
}

impl<T: Transport> Client<T> {
    /// Start a client on `transport`.
    ///
    /// Spawns the dispatcher task, so this must run inside a Tokio runtime.
    pub fn new(transport: T, config: ClientConfig) -> Self {
        let transport = Arc::new(transport);
        let pending = Arc::new(PendingTable::new());
        let shutdown = CancellationToken::new();

        tokio::spawn(dispatch(
            Arc::clone(&transport),
            Arc::clone(&pending),
            shutdown.clone(),
        ));

        tracing::debug!(target: "snmp_manager::client", { snmp.local_addr = %transport.local_addr() }, "client started");

        Self {
            inner: Arc::new(ClientInner {
                transport,
                config,
                pending,
                shutdown,
            }),
        }
    }

    /// Client-wide settings.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Local socket address.
    pub fn local_addr(&self) -> SocketAddr {
        self.inner.transport.local_addr()
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.inner.transport
    }

    /// Stop the dispatcher, fail in-flight requests and close the transport.
    ///
    /// In-flight and later requests fail with [`Error::Network`] of kind
    /// `NotConnected`. Affects every clone.
    pub fn shutdown(&self) {
        if self.inner.shutdown.is_cancelled() && self.inner.pending.is_closed() {
            return;
        }
        self.inner.shutdown.cancel();
        let failed = self.inner.pending.close();
        self.inner.transport.close();
        tracing::debug!(target: "snmp_manager::client", { snmp.failed_requests = failed }, "client shut down");
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_shutdown(&self) -> bool {
        self.inner.pending.is_closed()
    }

    /// GET the given OIDs.
    ///
    /// The response carries one binding per requested OID, in request order.
    /// Missing objects come back as `NoSuchObject` / `NoSuchInstance` values.
    #[instrument(skip_all, err, fields(snmp.target = %target.addr(), snmp.oid_count = oids.len()))]
    pub async fn get(&self, target: &Target, oids: &[Oid]) -> Result<Vec<VarBind>> {
        validate_oids(oids.iter())?;
        let response = self
            .transact(target, PduType::GetRequest, |id| Pdu::get_request(id, oids))
            .await?;
        Ok(response.varbinds)
    }

    /// GETNEXT the given OIDs: one binding per OID, each the successor of
    /// the requested one.
    #[instrument(skip_all, err, fields(snmp.target = %target.addr(), snmp.oid_count = oids.len()))]
    pub async fn get_next(&self, target: &Target, oids: &[Oid]) -> Result<Vec<VarBind>> {
        validate_oids(oids.iter())?;
        let response = self
            .transact(target, PduType::GetNextRequest, |id| {
                Pdu::get_next_request(id, oids)
            })
            .await?;
        Ok(response.varbinds)
    }

    /// SET the given bindings.
    ///
    /// Returns the agent's echo of the bindings. Write authority is decided
    /// by the agent; a refusal surfaces as [`Error::Snmp`].
    #[instrument(skip_all, err, fields(snmp.target = %target.addr(), snmp.oid_count = varbinds.len()))]
    pub async fn set(&self, target: &Target, varbinds: &[VarBind]) -> Result<Vec<VarBind>> {
        validate_oids(varbinds.iter().map(|vb| &vb.oid))?;
        if let Some(vb) = varbinds.iter().find(|vb| vb.value.is_exception()) {
            return Err(Error::Config(
                format!("cannot SET {} to exception value {}", vb.oid, vb.value).into(),
            )
            .boxed());
        }

        let response = self
            .transact(target, PduType::SetRequest, |id| {
                Pdu::set_request(id, varbinds.to_vec())
            })
            .await?;
        Ok(response.varbinds)
    }

    /// GETBULK (v2c only).
    ///
    /// The first `non_repeaters` OIDs get one successor each; the rest get up
    /// to `max_repetitions` successors each, interleaved row by row.
    ///
    /// ```rust,no_run
    /// # use snmp_manager::{Client, ClientConfig, Target, oid};
    /// # async fn example() -> snmp_manager::Result<()> {
    /// # let client = Client::bind(ClientConfig::default()).await?;
    /// # let target = Target::builder("192.0.2.10").build()?;
    /// // sysUpTime plus ten ifDescr rows
    /// let results = client
    ///     .get_bulk(
    ///         &target,
    ///         &[oid!(1, 3, 6, 1, 2, 1, 1, 3), oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 2)],
    ///         1,
    ///         10,
    ///     )
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip_all, err, fields(
        snmp.target = %target.addr(),
        snmp.oid_count = oids.len(),
        snmp.non_repeaters = non_repeaters,
        snmp.max_repetitions = max_repetitions
    ))]
    pub async fn get_bulk(
        &self,
        target: &Target,
        oids: &[Oid],
        non_repeaters: i32,
        max_repetitions: i32,
    ) -> Result<Vec<VarBind>> {
        if !target.version().supports_get_bulk() {
            return Err(Error::Config("GETBULK not supported in SNMPv1".into()).boxed());
        }
        if non_repeaters < 0 || max_repetitions < 0 {
            return Err(Error::Config(
                "non-repeaters and max-repetitions must not be negative".into(),
            )
            .boxed());
        }
        validate_oids(oids.iter())?;

        let response = self
            .transact(target, PduType::GetBulkRequest, |id| {
                Pdu::get_bulk(id, non_repeaters, max_repetitions, oids)
            })
            .await?;
        Ok(response.varbinds)
    }

    /// Walk the subtree under `root`.
    ///
    /// Uses the client's walk mode, ordering check and result cap. The walk
    /// yields bindings strictly inside `root`, in agent order.
    ///
    /// ```rust,no_run
    /// # use snmp_manager::{Client, ClientConfig, Target, oid};
    /// # async fn example() -> snmp_manager::Result<()> {
    /// # let client = Client::bind(ClientConfig::default()).await?;
    /// # let target = Target::builder("192.0.2.10").build()?;
    /// let mut walk = client.walk(&target, oid!(1, 3, 6, 1, 2, 1, 1))?;
    /// while let Some(vb) = walk.next().await {
    ///     println!("{}", vb?);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn walk(&self, target: &Target, root: Oid) -> Result<Walk<T>> {
        Walk::<T>::seed(&root).validate_for_wire()?;

        let config = &self.inner.config;
        if config.walk_mode == WalkMode::GetBulk && !target.version().supports_get_bulk() {
            return Err(Error::Config("GETBULK walk not supported in SNMPv1".into()).boxed());
        }

        tracing::debug!(target: "snmp_manager::client", { snmp.target = %target.addr(), snmp.oid = %root, snmp.walk_mode = ?config.walk_mode }, "starting walk");

        Ok(Walk::new(
            self.clone(),
            target.clone(),
            root,
            config.walk_mode,
            config.oid_ordering,
            config.max_walk_results,
            i32::try_from(config.max_repetitions).unwrap_or(i32::MAX),
        ))
    }

    /// Run one request/response transaction with retransmission.
    #[instrument(
        level = "debug",
        skip_all,
        fields(
            snmp.target = %target.addr(),
            snmp.pdu_type = %pdu_type,
            snmp.request_id = tracing::field::Empty,
            snmp.attempts = tracing::field::Empty,
            snmp.elapsed_ms = tracing::field::Empty,
        )
    )]
    async fn transact<F>(&self, target: &Target, pdu_type: PduType, build: F) -> Result<Pdu>
    where
        F: FnOnce(i32) -> Pdu + Send,
    {
        let mut pending = self
            .inner
            .pending
            .register()
            .ok_or_else(|| closed_error(target.addr()))?;
        let request_id = pending.id();
        Span::current().record("snmp.request_id", request_id);

        let request = CommunityMessage::new(target.version(), target.community_bytes(), build(request_id));
        let data = request.encode();

        tracing::debug!(target: "snmp_manager::client", { snmp.varbind_count = request.pdu.varbinds.len(), snmp.bytes = data.len() }, "sending {}", pdu_type);

        let retry = target.retry();
        let start = Instant::now();

        for attempt in 0..=retry.max_attempts {
            Span::current().record("snmp.attempts", attempt + 1);
            if attempt > 0 {
                let delay = retry.delay_for(attempt - 1);
                if !delay.is_zero() {
                    tracing::debug!(target: "snmp_manager::client", { delay_ms = delay.as_millis() as u64 }, "backing off");
                    tokio::time::sleep(delay).await;
                }
                tracing::debug!(target: "snmp_manager::client", { snmp.attempt = attempt }, "retransmitting request");
            }

            self.inner.transport.send_to(&data, target.addr()).await?;

            match tokio::time::timeout(target.timeout(), pending.receiver()).await {
                Ok(Ok((reply, source))) => {
                    Span::current().record("snmp.elapsed_ms", start.elapsed().as_millis() as u64);
                    if source != target.addr() {
                        tracing::warn!(target: "snmp_manager::client", { snmp.source = %source }, "response source address mismatch");
                    }
                    return self.accept(target, &request.pdu, reply);
                }
                Ok(Err(_)) => return Err(closed_error(target.addr())),
                Err(_) => {
                    tracing::trace!(target: "snmp_manager::client", { snmp.attempt = attempt }, "attempt timed out");
                }
            }
        }

        let elapsed = start.elapsed();
        Span::current().record("snmp.elapsed_ms", elapsed.as_millis() as u64);
        tracing::debug!(target: "snmp_manager::client", { ?elapsed, retries = retry.max_attempts }, "request timed out");
        Err(Error::Timeout {
            target: target.addr(),
            elapsed,
            retries: retry.max_attempts,
        }
        .boxed())
    }

    /// Decode a correlated reply and check it against the request.
    fn accept(&self, target: &Target, request: &Pdu, reply: Bytes) -> Result<Pdu> {
        let response = CommunityMessage::decode_with_policy(reply, self.inner.config.decode_policy)?;
        let protocol = |kind: ProtocolErrorKind| {
            tracing::warn!(target: "snmp_manager::client", { snmp.target = %target.addr(), %kind }, "invalid response");
            Error::Protocol {
                target: target.addr(),
                kind,
            }
            .boxed()
        };

        if response.version != target.version() {
            return Err(protocol(ProtocolErrorKind::VersionMismatch {
                expected: target.version().as_i32(),
                actual: response.version.as_i32(),
            }));
        }

        let pdu = response.pdu;
        if pdu.pdu_type != PduType::Response {
            return Err(protocol(ProtocolErrorKind::UnexpectedPduType(pdu.pdu_type.tag())));
        }

        if pdu.error_status != 0 {
            let status = ErrorStatus::from_i32(pdu.error_status);
            // error_index is 1-based; 0 means the error concerns the whole PDU
            let oid = usize::try_from(pdu.error_index)
                .ok()
                .and_then(|i| i.checked_sub(1))
                .and_then(|i| request.varbinds.get(i))
                .map(|vb| vb.oid.clone());

            tracing::debug!(target: "snmp_manager::client", { snmp.target = %target.addr(), %status, snmp.error_index = pdu.error_index }, "agent returned error");
            return Err(Error::Snmp {
                target: target.addr(),
                status,
                index: pdu.error_index.max(0) as u32,
                oid,
            }
            .boxed());
        }

        check_shape(request, &pdu).map_err(protocol)?;

        tracing::debug!(target: "snmp_manager::client", { snmp.varbind_count = pdu.varbinds.len() }, "received response");
        Ok(pdu)
    }
}

/// Check that the response bindings are what the request allows.
fn check_shape(request: &Pdu, response: &Pdu) -> std::result::Result<(), ProtocolErrorKind> {
    let expected = request.varbinds.len();
    let actual = response.varbinds.len();

    match request.pdu_type {
        PduType::GetRequest | PduType::SetRequest => {
            if actual != expected {
                return Err(ProtocolErrorKind::VarBindCountMismatch { expected, actual });
            }
            if let Some(index) = request
                .varbinds
                .iter()
                .zip(&response.varbinds)
                .position(|(req, resp)| req.oid != resp.oid)
            {
                return Err(ProtocolErrorKind::VarBindOidMismatch { index });
            }
        }
        PduType::GetNextRequest => {
            if actual != expected {
                return Err(ProtocolErrorKind::VarBindCountMismatch { expected, actual });
            }
        }
        PduType::GetBulkRequest => {
            let non_repeaters = request.error_status.clamp(0, expected as i32) as usize;
            let max_repetitions = request.error_index.max(0) as usize;
            let max = non_repeaters
                .saturating_add(max_repetitions.saturating_mul(expected - non_repeaters));
            if actual > max {
                return Err(ProtocolErrorKind::TooManyVarBinds { max, actual });
            }
        }
        PduType::Response => {}
    }
    Ok(())
}

fn validate_oids<'a>(oids: impl Iterator<Item = &'a Oid>) -> Result<()> {
    for oid in oids {
        oid.validate_for_wire()?;
    }
    Ok(())
}

/// Read datagrams until shutdown and hand each to the waiter for its
/// request-id.
/// Pause after a failed receive so a persistently failing socket cannot spin.
const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(10);

async fn dispatch<T: Transport>(
    transport: Arc<T>,
    pending: Arc<PendingTable>,
    shutdown: CancellationToken,
) {
    loop {
        let received = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            received = transport.recv_from() => received,
        };

        match received {
            Ok((data, source)) => match extract_request_id(&data) {
                Some(request_id) => {
                    let len = data.len();
                    if !pending.complete(request_id, (data, source)) {
                        tracing::debug!(target: "snmp_manager::client", { snmp.request_id = request_id, snmp.source = %source, snmp.bytes = len }, "discarding unmatched response");
                    }
                }
                None => {
                    tracing::debug!(target: "snmp_manager::client", { snmp.source = %source, snmp.bytes = data.len() }, "discarding datagram without request-id");
                }
            },
            Err(e) => {
                if let Error::Network { source, .. } = &*e
                    && source.kind() == std::io::ErrorKind::NotConnected
                {
                    break;
                }
                tracing::warn!(target: "snmp_manager::client", { error = %e }, "transport receive error");
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(RECV_ERROR_BACKOFF) => {}
                }
            }
        }
    }

    let failed = pending.close();
    tracing::debug!(target: "snmp_manager::client", { snmp.failed_requests = failed }, "dispatcher stopped");
}
