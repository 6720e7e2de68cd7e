//! UPnP IGD (Internet Gateway Device) discovery over SSDP
//!
//! UPnP uses SSDP (Simple Service Discovery Protocol) to discover IGD devices
//! on the local network, then SOAP to query them. Only the SSDP stage is
//! implemented: a gateway that answers the M-SEARCH is reported as a
//! distinct failure, because its external address would require a SOAP call
//! to `GetExternalIPAddress` on the device's control URL.

use super::transport::UdpTransport;
use super::types::{IpResult, Probe, ProbeError};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// SSDP multicast group and port
pub const SSDP_MULTICAST_ADDR: SocketAddrV4 =
    SocketAddrV4::new(Ipv4Addr::new(239, 255, 255, 250), 1900);

/// Default timeout for SSDP discovery
pub const SSDP_TIMEOUT: Duration = Duration::from_millis(2000);

/// Search target for Internet Gateway Devices
pub const IGD_SEARCH_TARGET: &str = "urn:schemas-upnp-org:device:InternetGatewayDevice:1";

/// Receive buffer for one SSDP response
const SSDP_MAX_RESPONSE_LEN: usize = 2048;

/// Build an SSDP M-SEARCH request for IGD devices
pub fn build_msearch_request(mx_secs: u64) -> String {
    format!(
        "M-SEARCH * HTTP/1.1\r\n\
         HOST: {}\r\n\
         MAN: \"ssdp:discover\"\r\n\
         MX: {}\r\n\
         ST: {}\r\n\
         \r\n",
        SSDP_MULTICAST_ADDR, mx_secs, IGD_SEARCH_TARGET
    )
}

/// Extract the `LOCATION` header (device description URL) from an SSDP reply
pub fn parse_location(response: &str) -> Option<&str> {
    response.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        name.trim()
            .eq_ignore_ascii_case("location")
            .then(|| value.trim())
    })
}

/// SSDP gateway discovery
///
/// Never succeeds on its own; see the module docs.
pub struct UpnpDiscoveryProbe {
    transport: Arc<dyn UdpTransport>,
    timeout: Duration,
}

impl UpnpDiscoveryProbe {
    /// Create a probe with the given discovery timeout
    pub fn new(transport: Arc<dyn UdpTransport>, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    fn discover(&self) -> ProbeError {
        let request = build_msearch_request(self.timeout.as_secs().max(1));
        let mut response = [0u8; SSDP_MAX_RESPONSE_LEN];

        let outcome = self.transport.exchange(
            SocketAddr::V4(SSDP_MULTICAST_ADDR),
            request.as_bytes(),
            &mut response,
            self.timeout,
        );

        match outcome {
            Ok((received, from)) => {
                let text = String::from_utf8_lossy(&response[..received]);
                match parse_location(&text) {
                    Some(location) => info!("UPnP gateway {} describes itself at {}", from, location),
                    None => info!("UPnP gateway {} answered SSDP search", from),
                }
                ProbeError::UpnpQueryUnsupported(from.ip())
            }
            Err(ProbeError::Timeout(_)) => ProbeError::NoGatewayFound,
            Err(e) => e,
        }
    }
}

impl Probe for UpnpDiscoveryProbe {
    fn name(&self) -> &'static str {
        "UPnP"
    }

    fn probe(&self) -> IpResult {
        let err = self.discover();
        debug!("UPnP failed: {}", err);
        IpResult::from_error(&err)
    }
}
