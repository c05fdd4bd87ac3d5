use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use std::net::IpAddr;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid network: {0}")]
pub struct ParseNetworkError(pub String);

/// Parses `addr/prefix`, `addr/netmask`, or a bare address as a single-host network.
///
/// The result is truncated to its network address, so `192.1.1.77/25`
/// becomes `192.1.1.0/25`.
pub fn parse_network(s: &str) -> Result<IpNet, ParseNetworkError> {
    let s = s.trim();
    if let Ok(net) = s.parse::<IpNet>() {
        return Ok(net.trunc());
    }

    let net = match s.split_once('/') {
        Some((addr, mask)) => with_netmask(addr, mask),
        None => match s.parse::<IpAddr>() {
            Ok(IpAddr::V4(v4)) => Ipv4Net::new(v4, 32).ok().map(IpNet::V4),
            Ok(IpAddr::V6(v6)) => Ipv6Net::new(v6, 128).ok().map(IpNet::V6),
            Err(_) => None,
        },
    };
    net.map(|net| net.trunc()).ok_or_else(|| ParseNetworkError(s.to_string()))
}

/// `255.255.255.0` style masks; both sides must be the same family and the
/// mask contiguous.
fn with_netmask(addr: &str, mask: &str) -> Option<IpNet> {
    match (addr.parse::<IpAddr>().ok()?, mask.parse::<IpAddr>().ok()?) {
        (IpAddr::V4(addr), IpAddr::V4(mask)) => {
            Ipv4Net::with_netmask(addr, mask).ok().map(IpNet::V4)
        }
        (IpAddr::V6(addr), IpAddr::V6(mask)) => {
            Ipv6Net::with_netmask(addr, mask).ok().map(IpNet::V6)
        }
        _ => None,
    }
}

/// Whether `network` contains `ip`. Addresses of the other family never match.
pub fn contains(network: &IpNet, ip: &IpAddr) -> bool {
    network.contains(ip)
}
