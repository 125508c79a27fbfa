use crate::discovery;
use crate::error::{Result, ScanError};
use crate::netdetect;
use crate::ports::related_ports;
use crate::probe::{self, probe_many};
use crate::types::{
    DiscoveredServer, PortProbeResult, ScanOutcome, ScanProgress, ScanState, SubnetInfo,
};
use std::collections::{BTreeSet, HashSet};
use std::future::Future;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Receives one [`ScanProgress`] per completed batch.
pub type ProgressSender<T> = mpsc::UnboundedSender<ScanProgress<T>>;

/// Parameters shared by every scan strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOptions {
    pub ports: Vec<u16>,
    /// Per-operation timeout: TCP connect for sweeps, UDP reply for discovery.
    pub timeout: Duration,
    /// TCP connect timeout for the related-port follow-up of discovery scans.
    pub related_timeout: Duration,
    /// Hosts per batch. Peak in-flight operations is `batch_size * ports.len()`.
    pub batch_size: usize,
}

/// Drives subnet sweeps and discovery in sequential, internally concurrent batches.
///
/// One scan at a time per instance: the engine does not gate re-entrancy, the
/// caller serializes. Cancellation is observed between batches only, and a
/// cancelled scanner stays cancelled; build a fresh one for the next scan.
#[derive(Debug)]
pub struct Scanner {
    state: watch::Sender<ScanState>,
    cancel: CancellationToken,
    resolve_subnet: fn() -> Option<SubnetInfo>,
}

impl Scanner {
    pub fn new() -> Self {
        Self::with_cancel(CancellationToken::new())
    }

    /// Use an externally owned token, e.g. one tripped by Ctrl-C.
    pub fn with_cancel(cancel: CancellationToken) -> Self {
        let (state, _) = watch::channel(ScanState::Idle);
        Self {
            state,
            cancel,
            resolve_subnet: netdetect::local_network_info,
        }
    }

    /// Replace the local subnet lookup used by subnet-wide scans.
    pub fn with_subnet_resolver(mut self, resolve: fn() -> Option<SubnetInfo>) -> Self {
        self.resolve_subnet = resolve;
        self
    }

    pub fn state(&self) -> ScanState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ScanState> {
        self.state.subscribe()
    }

    /// Request a stop at the next batch boundary.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// TCP sweep of every usable host in the local subnet.
    pub async fn scan_subnet_tcp(
        &self,
        opts: &ScanOptions,
        progress: Option<ProgressSender<PortProbeResult>>,
    ) -> Result<ScanOutcome<PortProbeResult>> {
        let hosts = self.local_hosts()?;
        Ok(self.scan_hosts(&hosts, opts, progress).await)
    }

    /// UDP discovery of every usable host in the local subnet, followed by
    /// related-port TCP probing of each newly found server.
    pub async fn scan_subnet_discovery(
        &self,
        opts: &ScanOptions,
        progress: Option<ProgressSender<DiscoveredServer>>,
    ) -> Result<ScanOutcome<DiscoveredServer>> {
        let hosts = self.local_hosts()?;
        Ok(self.discover_hosts(&hosts, opts, progress).await)
    }

    /// TCP sweep over an explicit host list. Progress counts hosts.
    pub async fn scan_hosts(
        &self,
        hosts: &[IpAddr],
        opts: &ScanOptions,
        progress: Option<ProgressSender<PortProbeResult>>,
    ) -> ScanOutcome<PortProbeResult> {
        let ports: Arc<[u16]> = opts.ports.clone().into();
        let timeout = opts.timeout;
        info!(
            hosts = hosts.len(),
            ports = ports.len(),
            batch_size = opts.batch_size,
            "starting TCP sweep"
        );

        self.run_batches(hosts, opts.batch_size, 1, progress, move |batch| {
            let ports = Arc::clone(&ports);
            async move {
                let mut set = JoinSet::new();
                for host in batch {
                    let ports = Arc::clone(&ports);
                    set.spawn(async move { probe_many(host, &ports, timeout).await });
                }
                join_batch(set).await.into_iter().flatten().collect()
            }
        })
        .await
    }

    /// UDP discovery over an explicit host list.
    ///
    /// Every host × port pair is one discovery attempt; progress counts
    /// attempts. A server is recorded once per `(host, claimed port)` no matter
    /// how many probed ports answered for it.
    pub async fn discover_hosts(
        &self,
        hosts: &[IpAddr],
        opts: &ScanOptions,
        progress: Option<ProgressSender<DiscoveredServer>>,
    ) -> ScanOutcome<DiscoveredServer> {
        let ports: Arc<[u16]> = opts.ports.clone().into();
        let timeout = opts.timeout;
        let related_timeout = opts.related_timeout;
        let claimed: Arc<Mutex<HashSet<(IpAddr, u16)>>> = Arc::new(Mutex::new(HashSet::new()));
        info!(
            hosts = hosts.len(),
            ports = ports.len(),
            batch_size = opts.batch_size,
            "starting discovery sweep"
        );

        let units = ports.len() as u64;
        self.run_batches(hosts, opts.batch_size, units, progress, move |batch| {
            let ports = Arc::clone(&ports);
            let claimed = Arc::clone(&claimed);
            async move {
                let mut set = JoinSet::new();
                for host in batch {
                    for &port in ports.iter() {
                        let claimed = Arc::clone(&claimed);
                        set.spawn(async move {
                            discover_one(host, port, timeout, related_timeout, claimed).await
                        });
                    }
                }
                join_batch(set).await.into_iter().flatten().collect()
            }
        })
        .await
    }

    fn local_hosts(&self) -> Result<Vec<IpAddr>> {
        let Some(subnet) = (self.resolve_subnet)() else {
            self.state.send_replace(ScanState::Failed);
            return Err(ScanError::NoLocalNetwork);
        };
        let hosts: Vec<IpAddr> = netdetect::enumerate_hosts(&subnet)
            .into_iter()
            .map(IpAddr::V4)
            .collect();
        info!(
            local_ip = %subnet.local_ip,
            netmask = %subnet.netmask,
            candidates = hosts.len(),
            "resolved local subnet"
        );
        Ok(hosts)
    }

    /// Sequential batches with a barrier after each. `units_per_host` scales
    /// the progress counters.
    async fn run_batches<T, F, Fut>(
        &self,
        hosts: &[IpAddr],
        batch_size: usize,
        units_per_host: u64,
        progress: Option<ProgressSender<T>>,
        mut run_batch: F,
    ) -> ScanOutcome<T>
    where
        T: Clone,
        F: FnMut(Vec<IpAddr>) -> Fut,
        Fut: Future<Output = Vec<T>>,
    {
        self.state.send_replace(ScanState::Running);
        let total = hosts.len() as u64 * units_per_host;
        let mut scanned = 0u64;
        let mut results: Vec<T> = Vec::new();
        let mut state = ScanState::Completed;

        for batch in hosts.chunks(batch_size.max(1)) {
            if self.cancel.is_cancelled() {
                info!(scanned, total, "scan cancelled");
                state = ScanState::Cancelled;
                break;
            }
            results.extend(run_batch(batch.to_vec()).await);
            scanned += batch.len() as u64 * units_per_host;

            if let Some(tx) = &progress {
                // A dropped receiver only means nobody is watching.
                let _ = tx.send(ScanProgress {
                    scanned,
                    total,
                    results: results.clone(),
                });
                // Let the consumer run (and possibly cancel) before the next batch.
                tokio::task::yield_now().await;
            }
        }

        info!(scanned, total, found = results.len(), ?state, "scan finished");
        self.state.send_replace(state);
        ScanOutcome {
            state,
            scanned,
            total,
            results,
        }
    }
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Barrier: wait for every task of a batch.
async fn join_batch<T: 'static>(mut set: JoinSet<T>) -> Vec<T> {
    let mut out = Vec::with_capacity(set.len());
    while let Some(res) = set.join_next().await {
        match res {
            Ok(v) => out.push(v),
            Err(e) => warn!("scan task failed: {e}"),
        }
    }
    out
}

async fn discover_one(
    host: IpAddr,
    port: u16,
    timeout: Duration,
    related_timeout: Duration,
    claimed: Arc<Mutex<HashSet<(IpAddr, u16)>>>,
) -> Option<DiscoveredServer> {
    let info = discovery::discover(host, port, timeout).await?;

    // Claim before probing so concurrent replies for the same server skip the follow-up.
    if !claimed.lock().await.insert((host, info.port)) {
        debug!(%host, probed = port, claimed = info.port, "duplicate discovery reply");
        return None;
    }
    debug!(%host, probed = port, claimed = info.port, database = %info.database, "server discovered");

    let open = probe_many(host, &related_ports(info.port), related_timeout).await;
    let response_time_ms = open
        .iter()
        .find(|r| r.port == info.port)
        .and_then(|r| r.response_time_ms);
    let related: BTreeSet<u16> = open.into_iter().map(|r| r.port).collect();

    Some(DiscoveredServer {
        host,
        port: info.port,
        is_open: true,
        response_time_ms,
        discovery_info: Some(info),
        related_ports: related,
    })
}

impl ScanOptions {
    /// TCP sweep defaults: 500ms connect timeout, 20 hosts per batch.
    pub fn tcp(ports: Vec<u16>) -> Self {
        Self {
            ports,
            timeout: probe::DEFAULT_TCP_TIMEOUT,
            related_timeout: probe::DEFAULT_TCP_TIMEOUT,
            batch_size: 20,
        }
    }

    /// Discovery defaults: 1000ms reply timeout, 30 hosts per batch.
    pub fn discovery(ports: Vec<u16>) -> Self {
        Self {
            ports,
            timeout: discovery::DEFAULT_DISCOVERY_TIMEOUT,
            related_timeout: probe::DEFAULT_TCP_TIMEOUT,
            batch_size: 30,
        }
    }
}
