//! UDP transport implementation.

use super::{Transport, closed_error};
use crate::error::{Error, Result};
use crate::util::{bind_udp_socket, ephemeral_bind_addr};
use bytes::Bytes;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

/// Largest datagram read from the socket.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 65535;

/// One unconnected UDP socket shared by every request of a client.
///
/// The socket is bound to an ephemeral port and may talk to any number of
/// agents; replies are routed by request-id in the client, not here.
///
/// ```rust,no_run
/// use snmp_manager::transport::{Transport, UdpTransport};
///
/// # async fn example() -> snmp_manager::Result<()> {
/// let transport = UdpTransport::bind("0.0.0.0:0".parse().unwrap()).await?;
/// println!("listening on {}", transport.local_addr());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct UdpTransport {
    inner: Arc<UdpTransportInner>,
}

struct UdpTransportInner {
    socket: UdpSocket,
    local_addr: SocketAddr,
    max_message_size: usize,
    closed: CancellationToken,
}

impl UdpTransport {
    /// Bind a socket to `addr`.
    ///
    /// IPv6 addresses get `IPV6_V6ONLY`, so an IPv6 transport only reaches
    /// IPv6 agents.
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        Self::bind_with(addr, DEFAULT_MAX_MESSAGE_SIZE).await
    }

    /// Bind an ephemeral socket in the same address family as `target`.
    pub async fn bind_for(target: SocketAddr) -> Result<Self> {
        Self::bind(ephemeral_bind_addr(&target)).await
    }

    /// Bind with an explicit receive buffer size.
    pub async fn bind_with(addr: SocketAddr, max_message_size: usize) -> Result<Self> {
        tracing::debug!(target: "snmp_manager::transport", { snmp.bind_addr = %addr }, "binding UDP transport");

        let socket = bind_udp_socket(addr, None).await.map_err(|e| Error::Network {
            target: addr,
            source: e,
        })?;

        let local_addr = socket.local_addr().map_err(|e| Error::Network {
            target: addr,
            source: e,
        })?;

        tracing::debug!(target: "snmp_manager::transport", { snmp.local_addr = %local_addr }, "UDP transport bound");

        Ok(Self {
            inner: Arc::new(UdpTransportInner {
                socket,
                local_addr,
                max_message_size,
                closed: CancellationToken::new(),
            }),
        })
    }

    /// Whether [`Transport::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.is_cancelled()
    }
}

impl Transport for UdpTransport {
    async fn send_to(&self, data: &[u8], target: SocketAddr) -> Result<()> {
        if self.is_closed() {
            return Err(closed_error(target));
        }

        tracing::trace!(
            target: "snmp_manager::transport",
            { snmp.target = %target, snmp.bytes = data.len() },
            "UDP send"
        );

        self.inner
            .socket
            .send_to(data, target)
            .await
            .map_err(|e| Error::Network { target, source: e })?;
        Ok(())
    }

    async fn recv_from(&self) -> Result<(Bytes, SocketAddr)> {
        let mut buf = vec![0u8; self.inner.max_message_size];

        let received = tokio::select! {
            _ = self.inner.closed.cancelled() => {
                return Err(closed_error(self.inner.local_addr));
            }
            received = self.inner.socket.recv_from(&mut buf) => received,
        };

        match received {
            Ok((len, source)) => {
                buf.truncate(len);
                tracing::trace!(
                    target: "snmp_manager::transport",
                    { snmp.source = %source, snmp.bytes = len },
                    "UDP recv"
                );
                Ok((Bytes::from(buf), source))
            }
            Err(e) => Err(Error::Network {
                target: self.inner.local_addr,
                source: e,
            }
            .boxed()),
        }
    }

    fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr
    }

    fn close(&self) {
        tracing::debug!(target: "snmp_manager::transport", { snmp.local_addr = %self.inner.local_addr }, "closing UDP transport");
        self.inner.closed.cancel();
    }
}
