//! Classification of detected addresses
//!
//! A gateway-reported address in the shared CGNAT range or in private space
//! means there is another NAT upstream, so the address is not reachable from
//! the internet. Classification is advisory; it never changes a result.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// CGNAT (RFC 6598) IP range: 100.64.0.0/10
const CGNAT_RANGE_START: u32 = 0x6440_0000; // 100.64.0.0
const CGNAT_RANGE_END: u32 = 0x647F_FFFF; // 100.127.255.255

/// Reachability class of a detected address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressClass {
    /// Globally routable
    Public,
    /// Carrier-grade NAT shared space (100.64.0.0/10)
    Cgnat,
    /// RFC 1918, loopback, link-local, ULA or unspecified
    Private,
}

/// Classify an address for logging and UX hints
pub fn classify(ip: IpAddr) -> AddressClass {
    if detect_cgnat(ip) {
        AddressClass::Cgnat
    } else if is_private_ip(ip) {
        AddressClass::Private
    } else {
        AddressClass::Public
    }
}

/// Whether an IPv4 address is within the CGNAT range
///
/// ```
/// use std::net::IpAddr;
/// use pubip::detection::detect_cgnat;
///
/// let cgnat_ip: IpAddr = "100.64.0.1".parse().unwrap();
/// assert!(detect_cgnat(cgnat_ip));
///
/// let public_ip: IpAddr = "203.0.113.5".parse().unwrap();
/// assert!(!detect_cgnat(public_ip));
/// ```
pub fn detect_cgnat(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => (CGNAT_RANGE_START..=CGNAT_RANGE_END).contains(&u32::from(ipv4)),
        IpAddr::V6(_) => false,
    }
}

/// Whether an address is private, loopback, link-local or unspecified
pub fn is_private_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => is_ipv4_private(&ipv4),
        IpAddr::V6(ipv6) => ipv6.is_loopback() || ipv6.is_unspecified() || is_ipv6_private(&ipv6),
    }
}

fn is_ipv4_private(ipv4: &Ipv4Addr) -> bool {
    ipv4.is_private() || ipv4.is_loopback() || ipv4.is_link_local() || ipv4.is_unspecified()
}

/// ULA (fc00::/7) or link-local (fe80::/10)
fn is_ipv6_private(ipv6: &Ipv6Addr) -> bool {
    let segments = ipv6.segments();
    (segments[0] & 0xfe00) == 0xfc00 || (segments[0] & 0xffc0) == 0xfe80
}
