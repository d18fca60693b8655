//! Per-agent request parameters.
//!
//! A [`Target`] bundles everything a single request needs to know about the
//! agent it talks to. It is immutable; hold one per device role, e.g. one
//! with the read community and one with the write community.

use std::net::{IpAddr, SocketAddr, ToSocketAddrs};
use std::time::Duration;

use bytes::Bytes;

use super::retry::Retry;
use crate::error::{Error, Result};
use crate::version::Version;

/// Default SNMP agent port.
pub const DEFAULT_PORT: u16 = 161;

/// Default per-attempt timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Agent address plus the community, version, timeout and retry policy used
/// for every request sent to it.
///
/// ```rust
/// use snmp_manager::{Retry, Target};
/// use std::time::Duration;
///
/// let target = Target::builder("192.0.2.10")
///     .community("private")
///     .timeout(Duration::from_secs(2))
///     .retry(Retry::none())
///     .build()
///     .unwrap();
///
/// assert_eq!(target.addr().port(), 161);
/// assert_eq!(target.community(), b"private");
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Target {
    addr: SocketAddr,
    community: Bytes,
    version: Version,
    timeout: Duration,
    retry: Retry,
}

impl Target {
    /// v2c target with default timeout and retry policy.
    pub fn new(addr: SocketAddr, community: impl Into<Bytes>) -> Self {
        Self {
            addr,
            community: community.into(),
            version: Version::V2c,
            timeout: DEFAULT_TIMEOUT,
            retry: Retry::default(),
        }
    }

    /// Start building a target from a host, `host:port` or socket address.
    pub fn builder(address: impl Into<String>) -> TargetBuilder {
        TargetBuilder::new(address)
    }

    /// Agent socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Community string.
    pub fn community(&self) -> &[u8] {
        &self.community
    }

    pub(crate) fn community_bytes(&self) -> Bytes {
        self.community.clone()
    }

    /// Protocol version.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Per-attempt timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Retransmission policy.
    pub fn retry(&self) -> &Retry {
        &self.retry
    }

    /// Same agent and settings, different community.
    pub fn with_community(&self, community: impl Into<Bytes>) -> Self {
        Self {
            community: community.into(),
            ..self.clone()
        }
    }
}

/// Builder for [`Target`].
#[derive(Debug, Clone)]
pub struct TargetBuilder {
    address: String,
    community: Bytes,
    version: Version,
    timeout: Duration,
    retry: Retry,
}

impl TargetBuilder {
    /// Start from an address with community `"public"`, v2c, 5s timeout and
    /// two retransmissions.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            community: Bytes::from_static(b"public"),
            version: Version::V2c,
            timeout: DEFAULT_TIMEOUT,
            retry: Retry::default(),
        }
    }

    /// Community string.
    pub fn community(mut self, community: impl Into<Bytes>) -> Self {
        self.community = community.into();
        self
    }

    /// Protocol version.
    pub fn version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    /// Per-attempt timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Retransmission policy.
    pub fn retry(mut self, retry: impl Into<Retry>) -> Self {
        self.retry = retry.into();
        self
    }

    /// Resolve the address and build the target.
    ///
    /// Hostnames are resolved with the system resolver; the first address
    /// wins. An address without a port gets port 161.
    pub fn build(self) -> Result<Target> {
        if self.timeout.is_zero() {
            return Err(Error::Config("timeout must be non-zero".into()).boxed());
        }

        let addr = resolve(&self.address)?;
        Ok(Target {
            addr,
            community: self.community,
            version: self.version,
            timeout: self.timeout,
            retry: self.retry,
        })
    }
}

/// Resolve `host`, `host:port`, `ip`, `ip:port` or `[ipv6]:port`.
pub(crate) fn resolve(address: &str) -> Result<SocketAddr> {
    let address = address.trim();
    if address.is_empty() {
        return Err(Error::Config("empty agent address".into()).boxed());
    }

    if let Ok(addr) = address.parse::<SocketAddr>() {
        return Ok(addr);
    }
    if let Ok(ip) = address.trim_matches(|c| c == '[' || c == ']').parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    let with_port = if address.contains(':') {
        address.to_string()
    } else {
        format!("{address}:{DEFAULT_PORT}")
    };

    with_port
        .to_socket_addrs()
        .map_err(|e| {
            Error::Config(format!("could not resolve address '{address}': {e}").into()).boxed()
        })?
        .next()
        .ok_or_else(|| Error::Config(format!("could not resolve address '{address}'").into()).boxed())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let target = Target::builder("192.0.2.1:1161").build().unwrap();
        assert_eq!(target.addr(), "192.0.2.1:1161".parse().unwrap());
        assert_eq!(target.community(), b"public");
        assert_eq!(target.version(), Version::V2c);
        assert_eq!(target.timeout(), Duration::from_millis(5000));
        assert_eq!(target.retry().max_attempts, 2);
    }

    #[test]
    fn test_default_port() {
        assert_eq!(resolve("192.0.2.1").unwrap().port(), 161);
        assert_eq!(resolve("::1").unwrap(), "[::1]:161".parse().unwrap());
        assert_eq!(resolve("[::1]").unwrap(), "[::1]:161".parse().unwrap());
        assert_eq!(resolve("localhost").unwrap().port(), 161);
    }

    #[test]
    fn test_resolve_errors() {
        assert!(matches!(*resolve("").unwrap_err(), Error::Config(_)));
        assert!(matches!(
            *resolve("no-such-host.invalid").unwrap_err(),
            Error::Config(_)
        ));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = Target::builder("127.0.0.1")
            .timeout(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(matches!(*err, Error::Config(_)));
    }

    #[test]
    fn test_with_community_keeps_everything_else() {
        let read = Target::builder("127.0.0.1")
            .version(Version::V1)
            .retry(Retry::none())
            .build()
            .unwrap();
        let write = read.with_community("private");

        assert_eq!(write.community(), b"private");
        assert_eq!(write.addr(), read.addr());
        assert_eq!(write.version(), Version::V1);
        assert_eq!(write.retry(), &Retry::none());
    }
}
