//! NAT-PMP (NAT Port Mapping Protocol) public address query - RFC 6886
//!
//! NAT-PMP is a legacy protocol supported by older routers, particularly Apple
//! AirPort devices and some Cisco routers. Only the public address request
//! (opcode 0) is used here; no mappings are created.
//!
//! # Protocol Overview
//!
//! The client sends a 2-byte request to UDP port 5351 of the default gateway:
//!
//! ```text
//! version(1) = 0 | opcode(1) = 0
//! ```
//!
//! The gateway answers with 12 bytes:
//!
//! ```text
//! version(1) | opcode(1) = 128 | result(2) | epoch(4) | external IPv4(4)
//! ```

use super::gateway::resolve_gateway;
use super::transport::UdpTransport;
use super::types::{IpResult, IpSource, Probe, ProbeError};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// NAT-PMP server port (IANA assigned)
pub const NATPMP_SERVER_PORT: u16 = 5351;

/// NAT-PMP protocol version
pub(crate) const NATPMP_VERSION: u8 = 0;

/// Length of the public address request
pub const NATPMP_REQUEST_LEN: usize = 2;

/// Minimum length of a public address response
pub const NATPMP_RESPONSE_LEN: usize = 12;

/// Default timeout for NAT-PMP requests
pub const NATPMP_TIMEOUT: Duration = Duration::from_millis(1000);

/// Bit set in the opcode of every response
const RESPONSE_BIT: u8 = 0x80;

/// NAT-PMP opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum NatPmpOpcode {
    /// External address request
    ExternalAddress = 0,
}

/// NAT-PMP result codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub(crate) enum NatPmpResultCode {
    Success = 0,
    UnsupportedVersion = 1,
    NotAuthorized = 2,
    NetworkFailure = 3,
    OutOfResources = 4,
    UnsupportedOpcode = 5,
}

impl NatPmpResultCode {
    pub(crate) fn from_u16(code: u16) -> Option<Self> {
        match code {
            0 => Some(Self::Success),
            1 => Some(Self::UnsupportedVersion),
            2 => Some(Self::NotAuthorized),
            3 => Some(Self::NetworkFailure),
            4 => Some(Self::OutOfResources),
            5 => Some(Self::UnsupportedOpcode),
            _ => None,
        }
    }

    pub(crate) fn to_error_message(&self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::UnsupportedVersion => "Unsupported NAT-PMP version",
            Self::NotAuthorized => "Not authorized/refused",
            Self::NetworkFailure => "Network failure",
            Self::OutOfResources => "Out of resources",
            Self::UnsupportedOpcode => "Unsupported opcode",
        }
    }
}

/// Build the NAT-PMP public address request
pub fn encode_request() -> [u8; NATPMP_REQUEST_LEN] {
    [NATPMP_VERSION, NatPmpOpcode::ExternalAddress as u8]
}

/// Parse a NAT-PMP public address response
///
/// The epoch field (bytes 4-7) is ignored.
pub fn decode_response(response: &[u8]) -> Result<Ipv4Addr, ProbeError> {
    if response.len() < NATPMP_RESPONSE_LEN {
        return Err(ProbeError::MalformedResponse(format!(
            "NAT-PMP response too short: {} bytes (expected {})",
            response.len(),
            NATPMP_RESPONSE_LEN
        )));
    }

    let version = response[0];
    if version != NATPMP_VERSION {
        return Err(ProbeError::MalformedResponse(format!(
            "Invalid NAT-PMP version: {} (expected {})",
            version, NATPMP_VERSION
        )));
    }

    let opcode = response[1];
    let expected_opcode = RESPONSE_BIT | NatPmpOpcode::ExternalAddress as u8;
    if opcode != expected_opcode {
        return Err(ProbeError::MalformedResponse(format!(
            "Invalid NAT-PMP opcode: {} (expected {})",
            opcode, expected_opcode
        )));
    }

    let result_code = u16::from_be_bytes([response[2], response[3]]);
    if result_code != NatPmpResultCode::Success as u16 {
        let reason = NatPmpResultCode::from_u16(result_code)
            .map(|code| code.to_error_message().to_string())
            .unwrap_or_else(|| format!("Unknown result code: {}", result_code));
        return Err(ProbeError::GatewayRefused(reason));
    }

    Ok(Ipv4Addr::new(
        response[8],
        response[9],
        response[10],
        response[11],
    ))
}

/// Public address query against the default gateway via NAT-PMP
pub struct NatPmpProbe {
    transport: Arc<dyn UdpTransport>,
    gateway: Option<Ipv4Addr>,
    timeout: Duration,
}

impl NatPmpProbe {
    /// Create a probe that looks up the default gateway on every run
    pub fn new(transport: Arc<dyn UdpTransport>, timeout: Duration) -> Self {
        Self {
            transport,
            gateway: None,
            timeout,
        }
    }

    /// Query a fixed gateway instead of the system default
    pub fn with_gateway(mut self, gateway: Ipv4Addr) -> Self {
        self.gateway = Some(gateway);
        self
    }

    fn query(&self) -> Result<Ipv4Addr, ProbeError> {
        let gateway = resolve_gateway(self.gateway)?;
        let server_addr = SocketAddr::new(gateway.into(), NATPMP_SERVER_PORT);

        let request = encode_request();
        let mut response = [0u8; 64];
        let (received, from) =
            self.transport
                .exchange(server_addr, &request, &mut response, self.timeout)?;
        debug!("Received {} bytes from NAT-PMP server {}", received, from);

        // Only the gateway itself may answer
        if from.ip() != IpAddr::V4(gateway) {
            return Err(ProbeError::MalformedResponse(format!(
                "NAT-PMP reply from {} instead of gateway {}",
                from.ip(),
                gateway
            )));
        }

        decode_response(&response[..received])
    }
}

impl Probe for NatPmpProbe {
    fn name(&self) -> &'static str {
        "NAT-PMP"
    }

    fn probe(&self) -> IpResult {
        match self.query() {
            Ok(ip) => {
                info!("NAT-PMP reported external address {}", ip);
                IpResult::found(ip.into(), IpSource::NATPMP)
            }
            Err(e) => {
                debug!("NAT-PMP failed: {}", e);
                IpResult::from_error(&e)
            }
        }
    }
}
