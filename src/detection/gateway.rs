//! Default gateway discovery for different platforms
//!
//! The gateway is the destination of the NAT-PMP and PCP probes. Only IPv4
//! default routes are considered.

use super::types::ProbeError;
use std::net::Ipv4Addr;
use tracing::debug;

/// Find the default gateway IP address
///
/// On Linux it reads the kernel routing table, on macOS it parses `netstat`
/// and on Windows `route print`. The first non-zero default route wins.
pub fn find_default_gateway() -> Result<Ipv4Addr, ProbeError> {
    #[cfg(target_os = "linux")]
    {
        find_gateway_linux()
    }

    #[cfg(target_os = "macos")]
    {
        find_gateway_macos()
    }

    #[cfg(target_os = "windows")]
    {
        find_gateway_windows()
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        Err(ProbeError::NotImplementedOnPlatform("default gateway lookup"))
    }
}

/// Use `configured` if present, otherwise look up the system default gateway
pub(crate) fn resolve_gateway(configured: Option<Ipv4Addr>) -> Result<Ipv4Addr, ProbeError> {
    match configured {
        Some(gateway) => Ok(gateway),
        None => {
            let gateway = find_default_gateway()?;
            debug!("Found default gateway: {}", gateway);
            Ok(gateway)
        }
    }
}

/// Extract the default gateway from the contents of `/proc/net/route`
///
/// Destination and gateway columns are hex in host (little-endian) order.
pub fn parse_proc_net_route(route_table: &str) -> Option<Ipv4Addr> {
    route_table.lines().skip(1).find_map(|line| {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 3 || fields[1] != "00000000" {
            return None;
        }

        let gateway = u32::from_str_radix(fields[2], 16).ok()?;
        let ip = Ipv4Addr::from(gateway.to_ne_bytes());
        (!ip.is_unspecified()).then_some(ip)
    })
}

/// Extract the default gateway from `netstat -rn -f inet` output
pub fn parse_netstat_routes(output: &str) -> Option<Ipv4Addr> {
    output
        .lines()
        .filter(|line| line.starts_with("default"))
        .find_map(|line| {
            let ip = line.split_whitespace().nth(1)?.parse::<Ipv4Addr>().ok()?;
            (!ip.is_unspecified()).then_some(ip)
        })
}

/// Extract the default gateway from `route print 0.0.0.0` output
pub fn parse_route_print(output: &str) -> Option<Ipv4Addr> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("0.0.0.0"))
        .find_map(|line| {
            let ip = line.split_whitespace().nth(2)?.parse::<Ipv4Addr>().ok()?;
            (!ip.is_unspecified()).then_some(ip)
        })
}

#[cfg(target_os = "linux")]
fn find_gateway_linux() -> Result<Ipv4Addr, ProbeError> {
    let route_table = std::fs::read_to_string("/proc/net/route").map_err(|e| {
        debug!("Failed to read route table: {}", e);
        ProbeError::NoGatewayFound
    })?;

    parse_proc_net_route(&route_table).ok_or(ProbeError::NoGatewayFound)
}

#[cfg(target_os = "macos")]
fn find_gateway_macos() -> Result<Ipv4Addr, ProbeError> {
    use std::process::Command;

    let output = Command::new("netstat")
        .args(["-rn", "-f", "inet"])
        .output()
        .map_err(|e| {
            debug!("Failed to run netstat: {}", e);
            ProbeError::NoGatewayFound
        })?;

    parse_netstat_routes(&String::from_utf8_lossy(&output.stdout))
        .ok_or(ProbeError::NoGatewayFound)
}

#[cfg(target_os = "windows")]
fn find_gateway_windows() -> Result<Ipv4Addr, ProbeError> {
    use std::process::Command;

    let output = Command::new("route")
        .args(["print", "0.0.0.0"])
        .output()
        .map_err(|e| {
            debug!("Failed to run route: {}", e);
            ProbeError::NoGatewayFound
        })?;

    parse_route_print(&String::from_utf8_lossy(&output.stdout)).ok_or(ProbeError::NoGatewayFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROC_NET_ROUTE: &str = "\
Iface\tDestination\tGateway \tFlags\tRefCnt\tUse\tMetric\tMask\t\tMTU\tWindow\tIRTT
eth0\t0000A8C0\t00000000\t0001\t0\t0\t100\t00FFFFFF\t0\t0\t0
eth0\t00000000\t0101A8C0\t0003\t0\t0\t100\t00000000\t0\t0\t0
";

    #[test]
    fn test_parse_proc_net_route() {
        assert_eq!(
            parse_proc_net_route(PROC_NET_ROUTE),
            Some(Ipv4Addr::new(192, 168, 1, 1))
        );
    }

    #[test]
    fn test_parse_proc_net_route_skips_zero_gateway() {
        let table = "\
Iface\tDestination\tGateway
tun0\t00000000\t00000000
eth0\t00000000\t0100000A
";
        assert_eq!(parse_proc_net_route(table), Some(Ipv4Addr::new(10, 0, 0, 1)));
    }

    #[test]
    fn test_parse_proc_net_route_without_default() {
        let table = "Iface\tDestination\tGateway\neth0\t0000A8C0\t00000000\n";
        assert_eq!(parse_proc_net_route(table), None);
    }

    #[test]
    fn test_parse_netstat_routes() {
        let output = "\
Routing tables

Internet:
Destination        Gateway            Flags        Netif Expire
default            192.168.0.1        UGScg          en0
127                127.0.0.1          UCS            lo0
";
        assert_eq!(
            parse_netstat_routes(output),
            Some(Ipv4Addr::new(192, 168, 0, 1))
        );
    }

    #[test]
    fn test_parse_route_print() {
        let output = "\
IPv4 Route Table
===========================================================================
Active Routes:
Network Destination        Netmask          Gateway       Interface  Metric
          0.0.0.0          0.0.0.0      10.0.0.138      10.0.0.23     35
";
        assert_eq!(parse_route_print(output), Some(Ipv4Addr::new(10, 0, 0, 138)));
    }

    #[test]
    fn test_resolve_gateway_prefers_configured() {
        let gateway = Ipv4Addr::new(192, 0, 2, 1);
        assert_eq!(resolve_gateway(Some(gateway)).unwrap(), gateway);
    }
}
