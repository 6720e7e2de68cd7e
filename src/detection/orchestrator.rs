//! Discovery orchestrator - tiered strategy selection
//!
//! Tiers run strictly in sequence, cheapest first:
//! 1. Local IPv6 (only when the address family asks for IPv6)
//! 2. NAT-PMP
//! 3. PCP
//! 4. UPnP discovery
//! 5. STUN (unless the strategy is `LocalOnly`)
//! 6. HTTP API (only with the `Full` strategy)
//!
//! The first tier to succeed wins. Failures are logged and the last one is
//! carried into the final diagnostic.

use super::cgnat::{classify, AddressClass};
use super::http_ip::{ApiProbe, HttpApiClient};
use super::ipv6::LocalIpv6Probe;
use super::natpmp::NatPmpProbe;
use super::pcp::PcpProbe;
use super::stun::StunProbe;
use super::transport::{SystemUdpTransport, UdpTransport};
use super::types::{DetectionRequest, IpResult, Probe, ProbeError, Strategy};
use super::upnp::UpnpDiscoveryProbe;
use crate::config::DetectorConfig;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The full set of tiers, one probe per mechanism
pub struct Tiers {
    /// Local interface IPv6 enumeration
    pub local_ipv6: Box<dyn Probe>,
    /// NAT-PMP public address request
    pub natpmp: Box<dyn Probe>,
    /// PCP ANNOUNCE
    pub pcp: Box<dyn Probe>,
    /// SSDP gateway discovery
    pub upnp: Box<dyn Probe>,
    /// STUN server list
    pub stun: Box<dyn Probe>,
    /// HTTP fallback
    pub api: Box<dyn Probe>,
}

impl Tiers {
    /// Build the standard probes over `transport`
    pub fn from_config(config: &DetectorConfig, transport: Arc<dyn UdpTransport>) -> Self {
        let mut natpmp = NatPmpProbe::new(transport.clone(), config.natpmp_timeout());
        let mut pcp = PcpProbe::new(transport.clone(), config.pcp_timeout());
        if let Some(gateway) = config.gateway {
            natpmp = natpmp.with_gateway(gateway);
            pcp = pcp.with_gateway(gateway);
        }

        Self {
            local_ipv6: Box::new(LocalIpv6Probe),
            natpmp: Box::new(natpmp),
            pcp: Box::new(pcp),
            upnp: Box::new(UpnpDiscoveryProbe::new(
                transport.clone(),
                config.ssdp_timeout(),
            )),
            stun: Box::new(StunProbe::new(
                transport,
                config.stun_servers.clone(),
                config.stun_timeout(),
            )),
            api: Box::new(ApiProbe::new(
                Box::new(HttpApiClient::new(config.api_timeout())),
                config.api_urls.clone(),
            )),
        }
    }
}

/// Position of a discovery call in the tier sequence
#[derive(Debug)]
enum DetectionState {
    NotStarted,
    CheckingIpv6,
    TryingLocalTiers,
    TryingStun,
    TryingApi,
    Succeeded(IpResult),
    Failed(String),
}

/// Public IP detector
///
/// Holds only immutable probes; every call opens its own sockets, so a
/// detector can be shared between threads behind an `Arc`.
///
/// # Example
///
/// ```no_run
/// use pubip::{AddressFamily, DetectionRequest, Detector, DetectorConfig, Strategy};
///
/// let detector = Detector::new(&DetectorConfig::default());
/// let result = detector.detect(DetectionRequest::new(
///     AddressFamily::IPv4Only,
///     Strategy::LocalWithStun,
/// ));
///
/// if result.is_success() {
///     println!("Public IP: {} (via {})", result.address(), result.source());
/// } else {
///     println!("Detection failed: {}", result.error());
/// }
/// ```
pub struct Detector {
    tiers: Tiers,
}

impl Detector {
    /// Create a detector with the standard probes over system sockets
    pub fn new(config: &DetectorConfig) -> Self {
        Self::with_tiers(Tiers::from_config(config, Arc::new(SystemUdpTransport)))
    }

    /// Create a detector from an explicit set of tiers
    pub fn with_tiers(tiers: Tiers) -> Self {
        Self { tiers }
    }

    /// Detect the public IP address, blocking until a tier succeeds or all
    /// permitted tiers have failed
    pub fn detect(&self, request: DetectionRequest) -> IpResult {
        info!(
            "Detecting public IP (family: {:?}, strategy: {})",
            request.family, request.strategy
        );

        let strategy = request.strategy;
        let mut last_error = String::new();
        let mut state = DetectionState::NotStarted;

        loop {
            debug!("Detection state: {:?}", state);

            state = match state {
                DetectionState::NotStarted => {
                    if request.family.wants_ipv6() {
                        DetectionState::CheckingIpv6
                    } else {
                        DetectionState::TryingLocalTiers
                    }
                }

                DetectionState::CheckingIpv6 => {
                    let result = run_tier(self.tiers.local_ipv6.as_ref());
                    if result.is_success() {
                        DetectionState::Succeeded(result)
                    } else if request.family.is_ipv6_exclusive() {
                        DetectionState::Failed(format!(
                            "No public IPv6 address available: {}",
                            result.error()
                        ))
                    } else {
                        last_error = format!("{}: {}", self.tiers.local_ipv6.name(), result.error());
                        DetectionState::TryingLocalTiers
                    }
                }

                DetectionState::TryingLocalTiers => {
                    let local = [
                        self.tiers.natpmp.as_ref(),
                        self.tiers.pcp.as_ref(),
                        self.tiers.upnp.as_ref(),
                    ];

                    match first_success(&local, &mut last_error) {
                        Some(result) => DetectionState::Succeeded(result),
                        None if strategy == Strategy::LocalOnly => {
                            DetectionState::Failed(exhausted(strategy, &last_error))
                        }
                        None => DetectionState::TryingStun,
                    }
                }

                DetectionState::TryingStun => {
                    match first_success(&[self.tiers.stun.as_ref()], &mut last_error) {
                        Some(result) => DetectionState::Succeeded(result),
                        None if strategy == Strategy::LocalWithStun => {
                            DetectionState::Failed(exhausted(strategy, &last_error))
                        }
                        None => DetectionState::TryingApi,
                    }
                }

                DetectionState::TryingApi => {
                    match first_success(&[self.tiers.api.as_ref()], &mut last_error) {
                        Some(result) => DetectionState::Succeeded(result),
                        None => DetectionState::Failed(exhausted(strategy, &last_error)),
                    }
                }

                DetectionState::Succeeded(result) => {
                    report_address(&result);
                    return result;
                }

                DetectionState::Failed(error) => {
                    warn!("Public IP detection failed: {}", error);
                    return IpResult::failed(error);
                }
            };
        }
    }

    /// Whether the gateway answers NAT-PMP or PCP
    ///
    /// Runs only those two tiers; no internet traffic is generated.
    pub fn is_local_detection_available(&self) -> bool {
        let mut last_error = String::new();
        let tiers = [self.tiers.natpmp.as_ref(), self.tiers.pcp.as_ref()];
        let available = first_success(&tiers, &mut last_error).is_some();

        if !available {
            debug!("Local detection unavailable: {}", last_error);
        }
        available
    }
}

/// Run one tier with entry and outcome logging
fn run_tier(probe: &dyn Probe) -> IpResult {
    info!("Attempting {}...", probe.name());
    let result = probe.probe();

    if result.is_success() {
        info!("{} succeeded: {}", probe.name(), result.address());
    } else {
        debug!("{} failed: {}", probe.name(), result.error());
    }
    result
}

/// Run `tiers` in order and return the first success
///
/// Every failure overwrites `last_error`.
fn first_success(tiers: &[&dyn Probe], last_error: &mut String) -> Option<IpResult> {
    for probe in tiers {
        let result = run_tier(*probe);
        if result.is_success() {
            return Some(result);
        }
        *last_error = format!("{}: {}", probe.name(), result.error());
    }
    None
}

fn exhausted(strategy: Strategy, last_error: &str) -> String {
    ProbeError::AllTiersExhausted {
        strategy,
        last: last_error.to_string(),
    }
    .to_string()
}

/// Warn when the detected address cannot be reached from the internet
fn report_address(result: &IpResult) {
    let Some(ip) = result.ip() else {
        return;
    };

    match classify(ip) {
        AddressClass::Public => {}
        AddressClass::Cgnat => warn!(
            "CGNAT detected: {} (via {}) is in 100.64.0.0/10; another NAT sits upstream",
            ip,
            result.source()
        ),
        AddressClass::Private => warn!(
            "{} (via {}) is a private address; the gateway is behind another NAT",
            ip,
            result.source()
        ),
    }
}
