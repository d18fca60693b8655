//! String-oriented facade over [`Client`] for one agent.
//!
//! A [`Session`] holds two targets for the same agent, one with the read
//! community and one with the write community, and accepts OIDs as dotted
//! text.

use std::time::Duration;

use crate::client::{Client, ClientConfig, Retry, Target, Walk};
use crate::error::{Error, ProtocolErrorKind, Result};
use crate::oid::Oid;
use crate::transport::{Transport, UdpTransport};
use crate::value::Value;
use crate::varbind::VarBind;

/// Connection settings for a [`Session`].
///
/// ```rust
/// use snmp_manager::SessionConfig;
///
/// let config = SessionConfig::new("192.0.2.10");
/// assert_eq!(config.read_community, "public");
/// assert_eq!(config.write_community, "private");
/// assert_eq!(config.retries, 2);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SessionConfig {
    /// Agent host, `host:port` or socket address; port 161 if omitted
    pub address: String,
    /// Community for GET and WALK
    pub read_community: String,
    /// Community for SET
    pub write_community: String,
    /// Per-attempt timeout
    #[cfg_attr(feature = "serde", serde(with = "duration_millis"))]
    pub timeout: Duration,
    /// Retransmissions after a timeout
    pub retries: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".into(),
            read_community: "public".into(),
            write_community: "private".into(),
            timeout: Duration::from_millis(5000),
            retries: 2,
        }
    }
}

impl SessionConfig {
    /// Defaults for the given agent address.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Default::default()
        }
    }

    fn targets(&self) -> Result<(Target, Target)> {
        let read = Target::builder(self.address.as_str())
            .community(self.read_community.clone())
            .timeout(self.timeout)
            .retry(Retry::immediate(self.retries))
            .build()?;
        let write = read.with_community(self.write_community.clone());
        Ok((read, write))
    }
}

#[cfg(feature = "serde")]
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// A manager session with one agent.
///
/// ```rust,no_run
/// use snmp_manager::{Session, SessionConfig};
///
/// # async fn example() -> snmp_manager::Result<()> {
/// let session = Session::connect(SessionConfig::new("192.0.2.10")).await?;
///
/// let descr = session.get("1.3.6.1.2.1.1.1.0").await?;
/// println!("sysDescr = {descr}");
///
/// session.set("1.3.6.1.2.1.1.4.0", "admin@example.com").await?;
///
/// let mut walk = session.walk("1.3.6.1.2.1.1")?;
/// while let Some(vb) = walk.next().await {
///     println!("{}", vb?);
/// }
///
/// session.close();
/// # Ok(())
/// # }
/// ```
pub struct Session<T: Transport = UdpTransport> {
    client: Client<T>,
    read: Target,
    write: Target,
}

impl Session<UdpTransport> {
    /// Resolve the agent, bind a UDP socket in its address family and start
    /// a client.
    pub async fn connect(config: SessionConfig) -> Result<Self> {
        let (read, write) = config.targets()?;
        let transport = UdpTransport::bind_for(read.addr()).await?;
        tracing::debug!(target: "snmp_manager::client", { snmp.target = %read.addr(), snmp.local_addr = %transport.local_addr() }, "session connected");
        Ok(Self {
            client: Client::new(transport, ClientConfig::default()),
            read,
            write,
        })
    }
}

impl<T: Transport> Session<T> {
    /// Start a session over an existing transport.
    pub fn with_transport(config: SessionConfig, transport: T) -> Result<Self> {
        Self::with_client_config(config, transport, ClientConfig::default())
    }

    /// Start a session over an existing transport with client settings.
    pub fn with_client_config(
        config: SessionConfig,
        transport: T,
        client_config: ClientConfig,
    ) -> Result<Self> {
        let (read, write) = config.targets()?;
        Ok(Self {
            client: Client::new(transport, client_config),
            read,
            write,
        })
    }

    /// The underlying client.
    pub fn client(&self) -> &Client<T> {
        &self.client
    }

    /// Target used for reads.
    pub fn read_target(&self) -> &Target {
        &self.read
    }

    /// Target used for writes.
    pub fn write_target(&self) -> &Target {
        &self.write
    }

    /// GET one object with the read community.
    ///
    /// Exception values such as `noSuchObject` are returned as values, not
    /// errors.
    pub async fn get(&self, oid: &str) -> Result<Value> {
        let oid = Oid::parse(oid)?;
        let varbinds = self.client.get(&self.read, std::slice::from_ref(&oid)).await?;
        single(&self.read, varbinds).map(|vb| vb.value)
    }

    /// SET one object with the write community.
    pub async fn set(&self, oid: &str, value: impl Into<Value>) -> Result<()> {
        let oid = Oid::parse(oid)?;
        let varbind = VarBind::new(oid, value.into());
        self.client.set(&self.write, &[varbind]).await?;
        Ok(())
    }

    /// Walk the subtree under `root` with the read community.
    pub fn walk(&self, root: &str) -> Result<Walk<T>> {
        let root = Oid::parse(root)?;
        self.client.walk(&self.read, root)
    }

    /// Shut the client down and release the socket.
    pub fn close(self) {
        tracing::debug!(target: "snmp_manager::client", { snmp.target = %self.read.addr() }, "closing session");
        self.client.shutdown();
    }
}

fn single(target: &Target, varbinds: Vec<VarBind>) -> Result<VarBind> {
    let actual = varbinds.len();
    let mut iter = varbinds.into_iter();
    match (iter.next(), actual) {
        (Some(vb), 1) => Ok(vb),
        _ => Err(Error::Protocol {
            target: target.addr(),
            kind: ProtocolErrorKind::VarBindCountMismatch {
                expected: 1,
                actual,
            },
        }
        .boxed()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorStatus;
    use crate::pdu::PduType;
    use crate::transport::{MockTransport, ResponseBuilder};

    fn config() -> SessionConfig {
        SessionConfig {
            timeout: Duration::from_millis(100),
            retries: 0,
            ..SessionConfig::new("192.0.2.1")
        }
    }

    /// Agent answering GET with the OID text and allowing SET only with
    /// community "private".
    fn mock() -> MockTransport {
        MockTransport::new(|req| {
            let reply = ResponseBuilder::for_request(req);
            let reply = match req.pdu.pdu_type {
                PduType::SetRequest if &req.community[..] != b"private" => reply
                    .error(ErrorStatus::NoAccess, 1)
                    .varbinds(req.pdu.varbinds.clone()),
                PduType::SetRequest => reply.varbinds(req.pdu.varbinds.clone()),
                _ => {
                    let oid = req.pdu.varbinds[0].oid.clone();
                    reply.varbind(oid.clone(), Value::from(oid.to_string()))
                }
            };
            vec![reply.build()]
        })
    }

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.timeout, Duration::from_millis(5000));
        assert_eq!(config.retries, 2);
        assert_eq!(config.read_community, "public");
        assert_eq!(config.write_community, "private");
    }

    #[tokio::test]
    async fn test_get_parses_text_oid() {
        let session = Session::with_transport(config(), mock()).unwrap();
        let value = session.get(".1.3.6.1.2.1.1.5.0").await.unwrap();
        assert_eq!(value.as_str(), Some("1.3.6.1.2.1.1.5.0"));
    }

    #[tokio::test]
    async fn test_get_invalid_oid_text() {
        let session = Session::with_transport(config(), mock()).unwrap();
        let err = session.get("1.3.six").await.unwrap_err();
        assert!(matches!(*err, Error::InvalidOid { .. }));
    }

    #[tokio::test]
    async fn test_set_uses_write_community() {
        let transport = mock();
        let session = Session::with_transport(config(), transport.clone()).unwrap();
        session
            .set("1.3.6.1.2.1.1.4.0", "admin@example.com")
            .await
            .unwrap();

        let sent = crate::message::CommunityMessage::decode(transport.requests()[0].data.clone()).unwrap();
        assert_eq!(&sent.community[..], b"private");
    }

    #[tokio::test]
    async fn test_set_with_read_only_community_fails() {
        let config = SessionConfig {
            write_community: "public".into(),
            ..config()
        };
        let session = Session::with_transport(config, mock()).unwrap();
        let err = session
            .set("1.3.6.1.2.1.1.4.0", "admin@example.com")
            .await
            .unwrap_err();
        assert!(matches!(
            *err,
            Error::Snmp {
                status: ErrorStatus::NoAccess,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_close_fails_later_requests() {
        let session = Session::with_transport(config(), mock()).unwrap();
        let client = session.client().clone();
        let target = session.read_target().clone();
        session.close();

        let err = client
            .get(&target, &[Oid::parse("1.3.6.1.2.1.1.1.0").unwrap()])
            .await
            .unwrap_err();
        assert!(matches!(*err, Error::Network { .. }));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_config_serde() {
        let config: SessionConfig =
            serde_json::from_str(r#"{"address":"10.0.0.1","timeout":1500}"#).unwrap();
        assert_eq!(config.address, "10.0.0.1");
        assert_eq!(config.timeout, Duration::from_millis(1500));
        assert_eq!(config.write_community, "private");
    }
}
