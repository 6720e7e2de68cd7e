//! Common types for the detection module

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;
use thiserror::Error;

/// Mechanism that produced an [`IpResult`]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum IpSource {
    /// Universal Plug and Play gateway
    UPnP,
    /// NAT Port Mapping Protocol (RFC 6886)
    NATPMP,
    /// Port Control Protocol (RFC 6887)
    PCP,
    /// Global IPv6 address assigned to a local interface
    LocalIPv6,
    /// STUN server reflection (RFC 5389)
    STUN,
    /// Public HTTP "what is my IP" service
    API,
    /// No mechanism succeeded
    Failed,
}

impl IpSource {
    /// Lowercase tag used in JSON output
    pub fn tag(&self) -> &'static str {
        match self {
            Self::UPnP => "upnp",
            Self::NATPMP => "natpmp",
            Self::PCP => "pcp",
            Self::LocalIPv6 => "local",
            Self::STUN => "stun",
            Self::API => "api",
            Self::Failed => "unknown",
        }
    }

    /// Human readable name for UX display
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::UPnP => "UPnP (Router)",
            Self::NATPMP => "NAT-PMP (Router)",
            Self::PCP => "PCP (Router)",
            Self::LocalIPv6 => "Local IPv6",
            Self::STUN => "STUN Server",
            Self::API => "HTTP API",
            Self::Failed => "Detection Failed",
        }
    }
}

impl fmt::Display for IpSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Which address family the caller is interested in
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum AddressFamily {
    /// Only IPv4 tiers run
    #[default]
    IPv4Only,
    /// Only the local IPv6 tier runs; its failure is final
    IPv6Only,
    /// Local IPv6 first, then the IPv4 tiers
    IPv6PreferIPv4,
}

impl AddressFamily {
    /// Whether the local IPv6 tier should run
    pub fn wants_ipv6(&self) -> bool {
        matches!(self, Self::IPv6Only | Self::IPv6PreferIPv4)
    }

    /// Whether an IPv6 failure ends the pipeline
    pub fn is_ipv6_exclusive(&self) -> bool {
        matches!(self, Self::IPv6Only)
    }
}

/// How far down the tier list the orchestrator may go
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Strategy {
    /// IPv6, NAT-PMP, PCP and UPnP only (no internet traffic)
    LocalOnly,
    /// Local tiers plus STUN
    #[default]
    LocalWithStun,
    /// Local tiers, STUN and the HTTP API fallback
    Full,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::LocalOnly => "local-only",
            Self::LocalWithStun => "local-with-stun",
            Self::Full => "full",
        })
    }
}

/// Input of a single discovery call
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct DetectionRequest {
    /// Address family preference
    pub family: AddressFamily,
    /// Tier budget
    pub strategy: Strategy,
}

impl DetectionRequest {
    /// Create a request from its two parts
    pub fn new(family: AddressFamily, strategy: Strategy) -> Self {
        Self { family, strategy }
    }
}

/// Outcome of a probe or of a whole discovery call
///
/// Fields are private so that a successful result always carries a
/// well-formed address and a real source, and a failed one always carries an
/// error message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "RawIpResult")]
pub struct IpResult {
    address: String,
    source: IpSource,
    is_ipv6: bool,
    success: bool,
    error: String,
}

impl IpResult {
    /// Successful detection of `ip` by `source`
    ///
    /// `IpSource::Failed` is not a producer, so it yields a failure instead.
    pub fn found(ip: IpAddr, source: IpSource) -> Self {
        if source == IpSource::Failed {
            return Self::failed(format!("Address {} reported without a source", ip));
        }

        Self {
            address: ip.to_string(),
            source,
            is_ipv6: ip.is_ipv6(),
            success: true,
            error: String::new(),
        }
    }

    /// Failed detection with a diagnostic
    pub fn failed(error: impl Into<String>) -> Self {
        let mut error = error.into();
        if error.is_empty() {
            error.push_str("Unknown error");
        }

        Self {
            address: String::new(),
            source: IpSource::Failed,
            is_ipv6: false,
            success: false,
            error,
        }
    }

    /// Failed detection described by a probe error
    pub fn from_error(err: &ProbeError) -> Self {
        Self::failed(err.to_string())
    }

    /// Detected address as text (empty on failure)
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Parsed address, if the detection succeeded
    pub fn ip(&self) -> Option<IpAddr> {
        if self.success {
            self.address.parse().ok()
        } else {
            None
        }
    }

    /// Mechanism that produced this result
    pub fn source(&self) -> IpSource {
        self.source
    }

    /// Whether the address is IPv6
    pub fn is_ipv6(&self) -> bool {
        self.is_ipv6
    }

    /// Whether detection succeeded
    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Diagnostic message (empty on success)
    pub fn error(&self) -> &str {
        &self.error
    }
}

/// Wire shape of [`IpResult`], checked before it becomes one
#[derive(Deserialize)]
struct RawIpResult {
    address: String,
    source: IpSource,
    is_ipv6: bool,
    success: bool,
    error: String,
}

impl TryFrom<RawIpResult> for IpResult {
    type Error = String;

    fn try_from(raw: RawIpResult) -> Result<Self, Self::Error> {
        if !raw.success {
            return Ok(Self::failed(raw.error));
        }

        let ip: IpAddr = raw
            .address
            .parse()
            .map_err(|_| format!("Invalid address in successful result: '{}'", raw.address))?;
        if raw.source == IpSource::Failed {
            return Err("Successful result without a source".to_string());
        }
        if ip.is_ipv6() != raw.is_ipv6 {
            return Err(format!("is_ipv6 does not match address {}", ip));
        }

        Ok(Self::found(ip, raw.source))
    }
}

/// Errors that can occur while probing a single tier
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The UDP socket could not be opened or configured
    #[error("Socket creation failed: {0}")]
    SocketCreation(#[source] std::io::Error),

    /// The request datagram could not be sent
    #[error("Send failed: {0}")]
    Send(#[source] std::io::Error),

    /// Receiving failed for a reason other than the deadline
    #[error("Receive failed: {0}")]
    Receive(#[source] std::io::Error),

    /// No response within the deadline
    #[error("No response within {} ms", .0.as_millis())]
    Timeout(Duration),

    /// Wrong length, version, opcode, magic or address family
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Gateway answered with a non-zero result code
    #[error("Gateway refused request: {0}")]
    GatewayRefused(String),

    /// No default gateway on this host
    #[error("No default gateway found")]
    NoGatewayFound,

    /// No global unicast IPv6 address on any interface
    #[error("No public IPv6 address found")]
    NoPublicIpv6,

    /// A server host name could not be resolved
    #[error("DNS resolution failed for {0}")]
    DnsResolutionFailed(String),

    /// A UPnP gateway answered SSDP but the SOAP stage is not implemented
    #[error("UPnP gateway found at {0}, but the external address query (SOAP) is not implemented")]
    UpnpQueryUnsupported(IpAddr),

    /// HTTP API request failed
    #[error("HTTP API error: {0}")]
    Http(String),

    /// Mechanism not available on this target
    #[error("Not implemented on this platform: {0}")]
    NotImplementedOnPlatform(&'static str),

    /// Every permitted tier failed
    #[error("All detection methods failed (strategy: {strategy}, last error: {last})")]
    AllTiersExhausted {
        /// Strategy that bounded the run
        strategy: Strategy,
        /// Diagnostic of the last tier attempted
        last: String,
    },
}

/// One detection tier
///
/// Implementations recover from every error locally and report it as a
/// failed [`IpResult`].
pub trait Probe: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Run the tier once
    fn probe(&self) -> IpResult;
}
