//! UDP request/response transport shared by all network probes
//!
//! Every probe performs exactly one exchange per attempt: open a transient
//! socket, send one datagram, wait for at most one reply, close. The
//! [`UdpTransport`] trait is the only place sockets are touched, so the codecs
//! and the orchestrator never depend on the platform socket API.

use super::types::ProbeError;
use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;
use tracing::{debug, trace};

/// Hop limit for SSDP multicast (stay within the local site)
const MULTICAST_TTL: u32 = 2;

/// Socket capability used by the probes
pub trait UdpTransport: Send + Sync {
    /// Send `request` to `dest` and wait up to `timeout` for one reply
    ///
    /// The reply is written into `response`; returns the number of bytes
    /// received and the address that sent them. The socket is released before
    /// returning on every path.
    fn exchange(
        &self,
        dest: SocketAddr,
        request: &[u8],
        response: &mut [u8],
        timeout: Duration,
    ) -> Result<(usize, SocketAddr), ProbeError>;

    /// Resolve a `host:port` string, preferring IPv4 results
    fn resolve(&self, target: &str) -> Result<SocketAddr, ProbeError> {
        let addrs: Vec<SocketAddr> = target
            .to_socket_addrs()
            .map_err(|e| {
                debug!("Resolving {} failed: {}", target, e);
                ProbeError::DnsResolutionFailed(target.to_string())
            })?
            .collect();

        addrs
            .iter()
            .find(|addr| addr.is_ipv4())
            .or_else(|| addrs.first())
            .copied()
            .ok_or_else(|| ProbeError::DnsResolutionFailed(target.to_string()))
    }
}

/// [`UdpTransport`] backed by `std::net::UdpSocket`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemUdpTransport;

impl SystemUdpTransport {
    fn open(dest: &SocketAddr, timeout: Duration) -> Result<UdpSocket, ProbeError> {
        let bind_addr = match dest.ip() {
            IpAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            IpAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
        };

        let socket = UdpSocket::bind(bind_addr).map_err(ProbeError::SocketCreation)?;
        socket
            .set_read_timeout(Some(timeout))
            .map_err(ProbeError::SocketCreation)?;
        socket
            .set_write_timeout(Some(timeout))
            .map_err(ProbeError::SocketCreation)?;

        if let IpAddr::V4(group) = dest.ip() {
            if group.is_multicast() {
                socket
                    .set_multicast_ttl_v4(MULTICAST_TTL)
                    .map_err(ProbeError::SocketCreation)?;
            }
        }

        Ok(socket)
    }
}

impl UdpTransport for SystemUdpTransport {
    fn exchange(
        &self,
        dest: SocketAddr,
        request: &[u8],
        response: &mut [u8],
        timeout: Duration,
    ) -> Result<(usize, SocketAddr), ProbeError> {
        let socket = Self::open(&dest, timeout)?;

        socket.send_to(request, dest).map_err(ProbeError::Send)?;
        trace!("Sent {} bytes to {}", request.len(), dest);

        let (received, from) = socket.recv_from(response).map_err(|e| match e.kind() {
            // Unix reports an expired SO_RCVTIMEO as WouldBlock, Windows as TimedOut
            ErrorKind::WouldBlock | ErrorKind::TimedOut => ProbeError::Timeout(timeout),
            _ => ProbeError::Receive(e),
        })?;
        trace!("Received {} bytes from {}", received, from);

        Ok((received, from))
    }
}
