//! Internal utilities.

use std::fmt::Write as _;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;

/// Create and bind a UDP socket.
///
/// IPv6 sockets get `IPV6_V6ONLY` so they never see IPv4-mapped traffic.
/// `recv_buffer_size` sets `SO_RCVBUF` when given; the kernel may round it.
pub(crate) async fn bind_udp_socket(
    addr: SocketAddr,
    recv_buffer_size: Option<usize>,
) -> io::Result<UdpSocket> {
    let domain = if addr.is_ipv6() {
        Domain::IPV6
    } else {
        Domain::IPV4
    };

    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;

    if addr.is_ipv6() {
        socket.set_only_v6(true)?;
    }
    if let Some(size) = recv_buffer_size {
        socket.set_recv_buffer_size(size)?;
    }

    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;

    UdpSocket::from_std(socket.into())
}

/// The wildcard address with an ephemeral port, in the same family as `target`.
pub(crate) fn ephemeral_bind_addr(target: &SocketAddr) -> SocketAddr {
    if target.is_ipv6() {
        SocketAddr::new(Ipv6Addr::UNSPECIFIED.into(), 0)
    } else {
        SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), 0)
    }
}

/// Lowercase hex without separators.
pub fn encode_hex(data: &[u8]) -> String {
    data.iter().fold(String::with_capacity(data.len() * 2), |mut out, b| {
        let _ = write!(out, "{:02x}", b);
        out
    })
}

/// Error returned by [`decode_hex`].
#[cfg_attr(not(feature = "testing"), allow(dead_code))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HexDecodeError {
    #[error("hex string has odd length")]
    OddLength,
    #[error("invalid hex digit at position {0}")]
    InvalidDigit(usize),
}

/// Parse hex, ignoring ASCII whitespace between bytes.
#[cfg_attr(not(feature = "testing"), allow(dead_code))]
pub fn decode_hex(s: &str) -> Result<Vec<u8>, HexDecodeError> {
    let digits: Vec<(usize, u8)> = s
        .bytes()
        .enumerate()
        .filter(|(_, b)| !b.is_ascii_whitespace())
        .collect();
    if digits.len() % 2 != 0 {
        return Err(HexDecodeError::OddLength);
    }

    let nibble = |(pos, b): (usize, u8)| {
        (b as char)
            .to_digit(16)
            .map(|d| d as u8)
            .ok_or(HexDecodeError::InvalidDigit(pos))
    };

    digits
        .chunks_exact(2)
        .map(|pair| Ok((nibble(pair[0])? << 4) | nibble(pair[1])?))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_udp_socket_ipv4() {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let socket = bind_udp_socket(addr, None).await.unwrap();
        let local = socket.local_addr().unwrap();
        assert!(local.is_ipv4());
        assert_ne!(local.port(), 0);
    }

    #[tokio::test]
    async fn test_bind_with_recv_buffer() {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let socket = bind_udp_socket(addr, Some(256 * 1024)).await.unwrap();
        assert_ne!(socket.local_addr().unwrap().port(), 0);
    }

    #[test]
    fn test_ephemeral_bind_addr_matches_family() {
        let v4: SocketAddr = "192.168.1.1:161".parse().unwrap();
        assert_eq!(ephemeral_bind_addr(&v4), "0.0.0.0:0".parse().unwrap());

        let v6: SocketAddr = "[2001:db8::1]:161".parse().unwrap();
        assert_eq!(ephemeral_bind_addr(&v6), "[::]:0".parse().unwrap());
    }

    #[test]
    fn test_hex() {
        assert_eq!(encode_hex(&[0x00, 0xAB, 0xFF]), "00abff");
        assert_eq!(encode_hex(&[]), "");
        assert_eq!(decode_hex("30 0a ff").unwrap(), vec![0x30, 0x0A, 0xFF]);
        assert_eq!(decode_hex("abc"), Err(HexDecodeError::OddLength));
        assert_eq!(decode_hex("zz"), Err(HexDecodeError::InvalidDigit(0)));
    }
}
