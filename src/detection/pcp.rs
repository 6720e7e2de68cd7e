//! PCP (Port Control Protocol) external address probe - RFC 6887
//!
//! PCP is the successor of NAT-PMP and shares its server port (5351). This
//! module sends an ANNOUNCE request, the cheapest PCP message, and reads the
//! external address out of the reply.
//!
//! # Protocol Details
//!
//! The request is the 24-byte PCP common header with version 2, opcode 0
//! (ANNOUNCE) and every other field zero.
//!
//! The response header is:
//!
//! ```text
//! version(1) = 2 | R+opcode(1) = 0x80 | reserved(1) | result(1) |
//! lifetime(4) | epoch(4) | reserved(12)
//! ```
//!
//! The address is read from bytes 8-11, the same offset NAT-PMP uses. A strict
//! RFC 6887 client would locate an IPv4-mapped IPv6 address inside an option
//! instead; that parser is not implemented and the offset is kept as is.

use super::gateway::resolve_gateway;
use super::transport::UdpTransport;
use super::types::{IpResult, IpSource, Probe, ProbeError};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// PCP protocol version
pub(crate) const PCP_VERSION: u8 = 2;

/// PCP server port (IANA assigned)
pub const PCP_SERVER_PORT: u16 = 5351;

/// Length of the PCP common header (request and minimum response)
pub const PCP_HEADER_LEN: usize = 24;

/// Default timeout for PCP requests
pub const PCP_TIMEOUT: Duration = Duration::from_millis(1000);

/// Largest PCP message (RFC 6887 section 7)
const PCP_MAX_MESSAGE_LEN: usize = 1100;

/// Response flag in the opcode byte
const RESPONSE_BIT: u8 = 0x80;

/// PCP opcode values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum PcpOpcode {
    Announce = 0,
}

/// PCP result codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum PcpResultCode {
    Success = 0,
    UnsuppVersion = 1,
    NotAuthorized = 2,
    MalformedRequest = 3,
    UnsuppOpcode = 4,
    UnsuppOption = 5,
    MalformedOption = 6,
    NetworkFailure = 7,
    NoResources = 8,
    UnsuppProtocol = 9,
    UserExQuota = 10,
    CannotProvideExternal = 11,
    AddressMismatch = 12,
    ExcessiveRemotePeers = 13,
}

impl PcpResultCode {
    pub(crate) fn from_u8(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Success),
            1 => Some(Self::UnsuppVersion),
            2 => Some(Self::NotAuthorized),
            3 => Some(Self::MalformedRequest),
            4 => Some(Self::UnsuppOpcode),
            5 => Some(Self::UnsuppOption),
            6 => Some(Self::MalformedOption),
            7 => Some(Self::NetworkFailure),
            8 => Some(Self::NoResources),
            9 => Some(Self::UnsuppProtocol),
            10 => Some(Self::UserExQuota),
            11 => Some(Self::CannotProvideExternal),
            12 => Some(Self::AddressMismatch),
            13 => Some(Self::ExcessiveRemotePeers),
            _ => None,
        }
    }

    pub(crate) fn to_error_message(&self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::UnsuppVersion => "Unsupported PCP version",
            Self::NotAuthorized => "Not authorized",
            Self::MalformedRequest => "Malformed request",
            Self::UnsuppOpcode => "Unsupported opcode",
            Self::UnsuppOption => "Unsupported option",
            Self::MalformedOption => "Malformed option",
            Self::NetworkFailure => "Network failure",
            Self::NoResources => "No resources available",
            Self::UnsuppProtocol => "Unsupported protocol",
            Self::UserExQuota => "User exceeded quota",
            Self::CannotProvideExternal => "Cannot provide external port",
            Self::AddressMismatch => "Address mismatch",
            Self::ExcessiveRemotePeers => "Excessive remote peers",
        }
    }
}

/// Build a PCP ANNOUNCE request
pub fn encode_request() -> [u8; PCP_HEADER_LEN] {
    let mut request = [0u8; PCP_HEADER_LEN];
    request[0] = PCP_VERSION;
    request[1] = PcpOpcode::Announce as u8;
    request
}

/// Parse a PCP ANNOUNCE response
pub fn decode_response(response: &[u8]) -> Result<Ipv4Addr, ProbeError> {
    if response.len() < PCP_HEADER_LEN {
        return Err(ProbeError::MalformedResponse(format!(
            "PCP response too short: {} bytes (expected at least {})",
            response.len(),
            PCP_HEADER_LEN
        )));
    }

    let version = response[0];
    if version != PCP_VERSION {
        return Err(ProbeError::MalformedResponse(format!(
            "Invalid PCP version: {} (expected {})",
            version, PCP_VERSION
        )));
    }

    let opcode_byte = response[1];
    let expected_opcode = RESPONSE_BIT | PcpOpcode::Announce as u8;
    if opcode_byte != expected_opcode {
        return Err(ProbeError::MalformedResponse(format!(
            "Invalid PCP opcode: 0x{:02x} (expected 0x{:02x})",
            opcode_byte, expected_opcode
        )));
    }

    let result_code = response[3];
    if result_code != PcpResultCode::Success as u8 {
        let reason = PcpResultCode::from_u8(result_code)
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

/// External address query against the default gateway via PCP
pub struct PcpProbe {
    transport: Arc<dyn UdpTransport>,
    gateway: Option<Ipv4Addr>,
    timeout: Duration,
}

impl PcpProbe {
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
        let server_addr = SocketAddr::new(gateway.into(), PCP_SERVER_PORT);

        let request = encode_request();
        let mut response = [0u8; PCP_MAX_MESSAGE_LEN];
        let (received, from) =
            self.transport
                .exchange(server_addr, &request, &mut response, self.timeout)?;
        debug!("Received {} bytes from PCP server {}", received, from);

        // Only the gateway itself may answer
        if from.ip() != IpAddr::V4(gateway) {
            return Err(ProbeError::MalformedResponse(format!(
                "PCP reply from {} instead of gateway {}",
                from.ip(),
                gateway
            )));
        }

        decode_response(&response[..received])
    }
}

impl Probe for PcpProbe {
    fn name(&self) -> &'static str {
        "PCP"
    }

    fn probe(&self) -> IpResult {
        match self.query() {
            Ok(ip) => {
                info!("PCP reported external address {}", ip);
                IpResult::found(ip.into(), IpSource::PCP)
            }
            Err(e) => {
                debug!("PCP failed: {}", e);
                IpResult::from_error(&e)
            }
        }
    }
}
