//! Local IPv6 address detection
//!
//! A host with a global unicast IPv6 address needs no NAT traversal to learn
//! its public address: it is already assigned to an interface.

use super::types::{IpResult, IpSource, Probe, ProbeError};
use std::net::{IpAddr, Ipv6Addr};
use tracing::{debug, info, trace};

/// Pick the first address that looks globally routable
///
/// Global unicast space is 2000::/3, so its canonical text form starts with
/// `2` or `3`. This excludes loopback, link-local (fe80::/10) and ULA
/// (fc00::/7) without consulting prefix tables.
pub fn select_public_ipv6<I>(addrs: I) -> Option<Ipv6Addr>
where
    I: IntoIterator<Item = IpAddr>,
{
    addrs.into_iter().find_map(|addr| match addr {
        IpAddr::V6(ipv6) if is_global_unicast(&ipv6) => Some(ipv6),
        _ => None,
    })
}

/// Whether an IPv6 address is in the global unicast range (2000::/3)
pub(crate) fn is_global_unicast(addr: &Ipv6Addr) -> bool {
    matches!(addr.to_string().chars().next(), Some('2' | '3'))
}

/// IPv6 view of one network interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceIpv6 {
    /// Interface name, for logs
    pub name: String,
    /// Whether the interface is administratively up
    pub is_up: bool,
    /// Whether this is a loopback interface
    pub is_loopback: bool,
    /// Assigned IPv6 addresses
    pub addrs: Vec<Ipv6Addr>,
}

/// Addresses of interfaces that are up and not loopback, in interface order
pub fn usable_addresses(interfaces: &[InterfaceIpv6]) -> Vec<IpAddr> {
    interfaces
        .iter()
        .filter(|iface| {
            if !iface.is_up {
                trace!("Skipping interface {}: down", iface.name);
            }
            iface.is_up && !iface.is_loopback
        })
        .flat_map(|iface| iface.addrs.iter().copied().map(IpAddr::V6))
        .collect()
}

fn system_interfaces() -> Vec<InterfaceIpv6> {
    netdev::get_interfaces()
        .into_iter()
        .map(|iface| InterfaceIpv6 {
            is_up: iface.is_up(),
            is_loopback: iface.is_loopback(),
            addrs: iface.ipv6.iter().map(|net| net.addr()).collect(),
            name: iface.name,
        })
        .collect()
}

/// Reports a global IPv6 address assigned to a local interface
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalIpv6Probe;

impl Probe for LocalIpv6Probe {
    fn name(&self) -> &'static str {
        "Local IPv6"
    }

    fn probe(&self) -> IpResult {
        let outcome = select_public_ipv6(usable_addresses(&system_interfaces()))
            .ok_or(ProbeError::NoPublicIpv6);

        match outcome {
            Ok(ipv6) => {
                info!("Global IPv6 address available: {}", ipv6);
                IpResult::found(IpAddr::V6(ipv6), IpSource::LocalIPv6)
            }
            Err(e) => {
                debug!("Local IPv6 failed: {}", e);
                IpResult::from_error(&e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_select_skips_non_global() {
        let addrs = vec![
            ip("192.168.1.10"),
            ip("::1"),
            ip("fe80::1c2d:3eff:fe4f:5a6b"),
            ip("fd12:3456:789a::1"),
            ip("2001:db8:85a3::8a2e:370:7334"),
            ip("2a00:1450:4001::1"),
        ];

        assert_eq!(
            select_public_ipv6(addrs),
            Some("2001:db8:85a3::8a2e:370:7334".parse().unwrap())
        );
    }

    #[test]
    fn test_select_accepts_3000_prefix() {
        assert_eq!(
            select_public_ipv6(vec![ip("3fff::1")]),
            Some("3fff::1".parse().unwrap())
        );
    }

    #[test]
    fn test_select_none() {
        assert_eq!(select_public_ipv6(vec![ip("10.0.0.1"), ip("fe80::1")]), None);
        assert_eq!(select_public_ipv6(Vec::new()), None);
    }

    fn iface(name: &str, is_up: bool, is_loopback: bool, addrs: &[&str]) -> InterfaceIpv6 {
        InterfaceIpv6 {
            name: name.to_string(),
            is_up,
            is_loopback,
            addrs: addrs.iter().map(|a| a.parse().unwrap()).collect(),
        }
    }

    #[test]
    fn test_usable_addresses_skip_down_interfaces() {
        let interfaces = vec![
            iface("lo", true, true, &["::1"]),
            iface("wlan0", false, false, &["2001:db8:dead::1"]),
            iface("eth0", true, false, &["fe80::1", "2001:db8:beef::2"]),
        ];

        let addrs = usable_addresses(&interfaces);
        assert_eq!(addrs, vec![ip("fe80::1"), ip("2001:db8:beef::2")]);
        assert_eq!(
            select_public_ipv6(addrs),
            Some("2001:db8:beef::2".parse().unwrap())
        );
    }

    #[test]
    fn test_usable_addresses_all_down() {
        let interfaces = vec![iface("eth0", false, false, &["2001:db8::1"])];
        assert!(usable_addresses(&interfaces).is_empty());
    }

    #[test]
    fn test_is_global_unicast() {
        assert!(is_global_unicast(&"2001:db8::1".parse().unwrap()));
        assert!(!is_global_unicast(&"fe80::1".parse().unwrap()));
        assert!(!is_global_unicast(&"::ffff:203.0.113.1".parse().unwrap()));
    }
}
