use crate::error::{Result, ScanError};
use crate::types::SubnetInfo;
use if_addrs::{get_if_addrs, IfAddr};
use ipnet::{IpNet, Ipv4Net};
use std::net::{IpAddr, Ipv4Addr};
use tracing::{debug, warn};

/// Subnet of the first non-loopback IPv4 interface on this host.
///
/// Returns `None` on a fully offline host, or when interface enumeration fails.
pub fn local_network_info() -> Option<SubnetInfo> {
    let ifaces = match get_if_addrs() {
        Ok(v) => v,
        Err(e) => {
            warn!("failed to enumerate network interfaces: {e}");
            return None;
        }
    };
    ifaces.into_iter().find_map(|iface| match iface.addr {
        IfAddr::V4(v4) if !v4.ip.is_loopback() => {
            debug!(iface = %iface.name, ip = %v4.ip, netmask = %v4.netmask, "selected interface");
            Some(compute_subnet(v4.ip, v4.netmask))
        }
        _ => None,
    })
}

/// Like [`local_network_info`], but absence is an error. Subnet-wide scans call
/// this before any batching starts.
pub fn require_local_network() -> Result<SubnetInfo> {
    local_network_info().ok_or(ScanError::NoLocalNetwork)
}

/// Pure octet-wise subnet arithmetic.
pub fn compute_subnet(ip: Ipv4Addr, netmask: Ipv4Addr) -> SubnetInfo {
    let ip_o = ip.octets();
    let mask = netmask.octets();

    let mut network = [0u8; 4];
    let mut broadcast = [0u8; 4];
    for i in 0..4 {
        network[i] = ip_o[i] & mask[i];
        broadcast[i] = network[i] | !mask[i];
    }

    let mut first = network;
    first[3] = first[3].wrapping_add(1);
    let mut last = broadcast;
    last[3] = last[3].wrapping_sub(1);

    let capacity: u64 = mask.iter().map(|&m| 256 - u64::from(m)).product();

    SubnetInfo {
        local_ip: ip,
        netmask,
        network_address: Ipv4Addr::from(network),
        broadcast_address: Ipv4Addr::from(broadcast),
        first_host: Ipv4Addr::from(first),
        last_host: Ipv4Addr::from(last),
        total_hosts: capacity.saturating_sub(2),
    }
}

/// Candidate host addresses for a subnet scan, in ascending order.
///
/// Subnets whose usable range spans more than one /24 are deliberately cut
/// down to the local /24 (`.1` to `.254`) to bound scan cost. Callers scanning
/// a /16 will only see the /24 they sit in.
pub fn enumerate_hosts(info: &SubnetInfo) -> Vec<Ipv4Addr> {
    if info.total_hosts == 0 {
        return Vec::new();
    }
    let first = info.first_host.octets();
    let last = info.last_host.octets();
    if first[..3] == last[..3] {
        (first[3]..=last[3])
            .map(|o| Ipv4Addr::new(first[0], first[1], first[2], o))
            .collect()
    } else {
        local_slash24_hosts(info.local_ip)
    }
}

/// `.1` through `.254` of the /24 containing `ip`.
pub fn local_slash24_hosts(ip: Ipv4Addr) -> Vec<Ipv4Addr> {
    let o = ip.octets();
    (1..=254).map(|last| Ipv4Addr::new(o[0], o[1], o[2], last)).collect()
}

impl SubnetInfo {
    /// CIDR form of this subnet, if the netmask is contiguous.
    pub fn cidr(&self) -> Option<Ipv4Net> {
        Ipv4Net::with_netmask(self.network_address, self.netmask).ok()
    }
}

/// Parse explicit scan targets: plain IPs or CIDR blocks.
///
/// CIDR blocks expand to their usable hosts (network and broadcast excluded).
/// IPv6 blocks are not enumerated and contribute nothing.
pub fn parse_targets(targets: &[String]) -> Result<Vec<IpAddr>> {
    let mut out = Vec::new();
    for raw in targets {
        let t = raw.trim();
        if t.contains('/') {
            let net: IpNet = t
                .parse()
                .map_err(|e| ScanError::InvalidTarget(format!("{t}: {e}")))?;
            out.extend(expand_cidr_to_ips(net));
        } else {
            let ip: IpAddr = t
                .parse()
                .map_err(|e| ScanError::InvalidTarget(format!("{t}: {e}")))?;
            out.push(ip);
        }
    }
    Ok(out)
}

/// Usable hosts of a CIDR block. IPv6 returns an empty list.
pub fn expand_cidr_to_ips(cidr: IpNet) -> Vec<IpAddr> {
    match cidr {
        IpNet::V4(n4) => {
            let start = u32::from(n4.network());
            let end = u32::from(n4.broadcast());
            if end <= start.saturating_add(1) {
                return Vec::new();
            }
            (start + 1..end)
                .map(|n| IpAddr::V4(Ipv4Addr::from(n)))
                .collect()
        }
        IpNet::V6(_) => Vec::new(),
    }
}
