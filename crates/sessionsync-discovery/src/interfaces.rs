//! Local network enumeration and probe target ordering

use network_interface::{Addr, NetworkInterface, NetworkInterfaceConfig};
use serde::Serialize;
use sessionsync_core::Family;
use std::collections::HashSet;
use std::net::{Ipv4Addr, SocketAddr};
use tracing::debug;

use crate::error::{DiscoveryError, Result};

/// A non-loopback IPv4 interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalInterface {
    pub name: String,
    pub ip: Ipv4Addr,
    pub netmask: Option<Ipv4Addr>,
}

impl LocalInterface {
    pub fn new(name: impl Into<String>, ip: Ipv4Addr, netmask: Option<Ipv4Addr>) -> Self {
        Self {
            name: name.into(),
            ip,
            netmask,
        }
    }

    /// First three octets; the scan always covers the /24 around the interface
    pub fn subnet(&self) -> [u8; 3] {
        let [a, b, c, _] = self.ip.octets();
        [a, b, c]
    }

    pub fn host(&self, host: u8) -> Ipv4Addr {
        let [a, b, c] = self.subnet();
        Ipv4Addr::new(a, b, c, host)
    }
}

/// One (address, port, assumed family) query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeTarget {
    pub ip: Ipv4Addr,
    pub port: u16,
    pub family: Family,
}

impl ProbeTarget {
    pub fn new(ip: Ipv4Addr, port: u16, family: Family) -> Self {
        Self { ip, port, family }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::from((self.ip, self.port))
    }
}

/// List all non-loopback IPv4 interfaces
pub fn list_interfaces() -> Result<Vec<LocalInterface>> {
    let interfaces = NetworkInterface::show()
        .map_err(|e| DiscoveryError::Interfaces(e.to_string()))?;

    let found: Vec<LocalInterface> = interfaces
        .into_iter()
        .flat_map(|iface| {
            let name = iface.name;
            iface.addr.into_iter().filter_map(move |addr| match addr {
                Addr::V4(v4) if is_scannable(v4.ip) => {
                    Some(LocalInterface::new(name.clone(), v4.ip, v4.netmask))
                }
                _ => None,
            })
        })
        .collect();

    debug!("Found {} scannable interfaces", found.len());
    Ok(found)
}

fn is_scannable(ip: Ipv4Addr) -> bool {
    !ip.is_loopback() && !ip.is_unspecified()
}

/// Interfaces with distinct /24 subnets, first one wins
pub fn distinct_subnets(interfaces: &[LocalInterface]) -> Vec<LocalInterface> {
    let mut seen = HashSet::new();
    interfaces
        .iter()
        .filter(|iface| seen.insert(iface.subnet()))
        .cloned()
        .collect()
}

/// Ordered candidate addresses for an interface's subnet
///
/// Priority hosts come first, then 1..=254 ascending. The interface's own
/// address and repeats of priority hosts are skipped.
pub fn derive_candidates(iface: &LocalInterface, priority_hosts: &[u8]) -> Vec<Ipv4Addr> {
    let mut seen = HashSet::new();
    priority_hosts
        .iter()
        .copied()
        .filter(|host| (1..=254).contains(host))
        .chain(1..=254)
        .map(|host| iface.host(host))
        .filter(|ip| *ip != iface.ip && seen.insert(*ip))
        .collect()
}

/// Expand candidates into targets, one per probed (family, port)
pub fn probe_targets(candidates: &[Ipv4Addr], ports: &[(Family, u16)]) -> Vec<ProbeTarget> {
    candidates
        .iter()
        .flat_map(|ip| {
            ports
                .iter()
                .map(move |(family, port)| ProbeTarget::new(*ip, *port, *family))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRIORITY: [u8; 5] = [1, 2, 10, 100, 200];

    fn iface(ip: [u8; 4]) -> LocalInterface {
        LocalInterface::new("eth0", Ipv4Addr::from(ip), Some(Ipv4Addr::new(255, 255, 255, 0)))
    }

    #[test]
    fn test_priority_hosts_first() {
        let candidates = derive_candidates(&iface([10, 0, 0, 5]), &PRIORITY);
        let first: Vec<Ipv4Addr> = candidates[..5].to_vec();
        assert_eq!(
            first,
            vec![
                Ipv4Addr::new(10, 0, 0, 1),
                Ipv4Addr::new(10, 0, 0, 2),
                Ipv4Addr::new(10, 0, 0, 10),
                Ipv4Addr::new(10, 0, 0, 100),
                Ipv4Addr::new(10, 0, 0, 200),
            ]
        );
        // Remainder ascends
        assert_eq!(candidates[5], Ipv4Addr::new(10, 0, 0, 3));
        assert_eq!(candidates[6], Ipv4Addr::new(10, 0, 0, 4));
        assert_eq!(candidates[7], Ipv4Addr::new(10, 0, 0, 6));
        assert_eq!(*candidates.last().unwrap(), Ipv4Addr::new(10, 0, 0, 254));
    }

    #[test]
    fn test_every_host_exactly_once() {
        let local = Ipv4Addr::new(10, 0, 0, 5);
        let candidates = derive_candidates(&iface([10, 0, 0, 5]), &PRIORITY);

        assert!(!candidates.contains(&local));
        assert_eq!(candidates.len(), 253);
        for host in 1..=254u8 {
            let ip = Ipv4Addr::new(10, 0, 0, host);
            let count = candidates.iter().filter(|c| **c == ip).count();
            assert_eq!(count, usize::from(ip != local), "host {}", host);
        }
    }

    #[test]
    fn test_local_address_in_priority_set() {
        let candidates = derive_candidates(&iface([192, 168, 1, 100]), &PRIORITY);
        assert!(!candidates.contains(&Ipv4Addr::new(192, 168, 1, 100)));
        assert_eq!(candidates[3], Ipv4Addr::new(192, 168, 1, 200));
        assert_eq!(candidates.len(), 253);
    }

    #[test]
    fn test_probe_targets_per_port() {
        let candidates = vec![Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2)];
        let ports = [(Family::X32M32, 10023), (Family::Wing, 2222)];
        let targets = probe_targets(&candidates, &ports);
        assert_eq!(targets.len(), 4);
        assert_eq!(targets[0], ProbeTarget::new(candidates[0], 10023, Family::X32M32));
        assert_eq!(targets[1], ProbeTarget::new(candidates[0], 2222, Family::Wing));
        assert_eq!(targets[3].socket_addr(), "10.0.0.2:2222".parse().unwrap());
    }

    #[test]
    fn test_distinct_subnets() {
        let interfaces = vec![
            iface([10, 0, 0, 5]),
            iface([10, 0, 0, 6]),
            iface([192, 168, 1, 20]),
        ];
        let distinct = distinct_subnets(&interfaces);
        assert_eq!(distinct.len(), 2);
        assert_eq!(distinct[0].ip, Ipv4Addr::new(10, 0, 0, 5));
    }

    #[test]
    fn test_loopback_not_scannable() {
        assert!(!is_scannable(Ipv4Addr::LOCALHOST));
        assert!(is_scannable(Ipv4Addr::new(10, 0, 0, 5)));
    }
}
