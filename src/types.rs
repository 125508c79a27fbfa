use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv4Addr};

/// Address arithmetic for the local IPv4 subnet.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubnetInfo {
    pub local_ip: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub network_address: Ipv4Addr,
    pub broadcast_address: Ipv4Addr,
    pub first_host: Ipv4Addr,
    pub last_host: Ipv4Addr,
    /// Usable host count, clamped at zero for /31 and /32 masks.
    pub total_hosts: u64,
}

/// Outcome of one TCP connect attempt.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PortProbeResult {
    pub host: IpAddr,
    pub port: u16,
    pub is_open: bool,
    /// Only set when the connection succeeded.
    pub response_time_ms: Option<u64>,
}

/// Identity claimed by a server in its discovery reply.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryInfo {
    /// Machine hostname of the server.
    pub host: String,
    pub service: String,
    pub database: String,
    /// Application port the server listens on.
    pub port: u16,
}

/// One server found by a discovery sweep, keyed by `(host, port)`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredServer {
    pub host: IpAddr,
    pub port: u16,
    pub is_open: bool,
    pub response_time_ms: Option<u64>,
    pub discovery_info: Option<DiscoveryInfo>,
    /// Open TCP ports within `port - 2 ..= port + 2`.
    pub related_ports: BTreeSet<u16>,
}

/// Lifecycle of a single scan.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScanState {
    #[default]
    Idle,
    Running,
    Completed,
    Cancelled,
    Failed,
}

/// Emitted once per completed batch.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ScanProgress<T> {
    pub scanned: u64,
    pub total: u64,
    /// Everything accumulated so far, in discovery order.
    pub results: Vec<T>,
}

/// Terminal value of a scan.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ScanOutcome<T> {
    pub state: ScanState,
    pub scanned: u64,
    pub total: u64,
    pub results: Vec<T>,
}
