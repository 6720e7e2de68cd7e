//! Detection module for public IP discovery
//!
//! This module discovers the host's public address through several
//! mechanisms, tried in order of cost:
//! - Local IPv6 interface enumeration
//! - NAT-PMP (NAT Port Mapping Protocol) - RFC 6886
//! - PCP (Port Control Protocol) - RFC 6887
//! - UPnP gateway discovery (SSDP)
//! - STUN (Session Traversal Utilities for NAT) - RFC 5389
//! - HTTP "what is my IP" services
//!
//! Wire codecs are pure functions in the protocol submodules; all socket I/O
//! goes through [`UdpTransport`].

// Submodules
pub mod cgnat;
pub mod dispatch;
pub mod format;
pub mod gateway;
pub mod http_ip;
pub mod ipv6;
pub mod natpmp;
pub mod orchestrator;
pub mod pcp;
pub mod stun;
pub mod transport;
pub mod types;
pub mod upnp;

// Re-export commonly used types
pub use types::{AddressFamily, DetectionRequest, IpResult, IpSource, Probe, ProbeError, Strategy};

// Re-export main entry points
pub use cgnat::{classify, detect_cgnat, is_private_ip, AddressClass};
pub use dispatch::{CompletionContext, CompletionJob, Inline};
pub use format::{format_result, OutputFormat};
pub use gateway::find_default_gateway;
pub use http_ip::{ApiClient, ApiProbe, HttpApiClient};
pub use ipv6::{usable_addresses, InterfaceIpv6, LocalIpv6Probe};
pub use natpmp::NatPmpProbe;
pub use orchestrator::{Detector, Tiers};
pub use pcp::PcpProbe;
pub use stun::StunProbe;
pub use transport::{SystemUdpTransport, UdpTransport};
pub use upnp::UpnpDiscoveryProbe;
