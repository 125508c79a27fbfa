use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

use lan_discover_rs::cache::ScanCache;
use lan_discover_rs::config::ScanConfig;
use lan_discover_rs::netdetect;
use lan_discover_rs::ports::parse_port_spec;
use lan_discover_rs::scanner::{ProgressSender, ScanOptions, Scanner};
use lan_discover_rs::types::{
    DiscoveredServer, PortProbeResult, ScanOutcome, ScanProgress, ScanState,
};

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// lan-discover-rs — find application servers on the local network via UDP discovery and TCP probing.
#[derive(Debug, Clone, Parser)]
#[command(name = "lan-discover-rs", version, long_about = None)]
struct Cli {
    /// JSON file with scan settings (port range, timeouts, batch sizes, cache TTL).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Write results as pretty JSON to this path (optional).
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Print the local subnet that subnet-wide scans would cover.
    Subnet,
    /// TCP sweep of the local subnet.
    Tcp(ScanArgs),
    /// UDP discovery sweep of the local subnet.
    Discover {
        #[command(flatten)]
        scan: ScanArgs,
        /// Keep running, re-scanning whenever cached results go stale; check every N seconds.
        #[arg(long)]
        watch: Option<u64>,
        /// Cache freshness window in seconds.
        #[arg(long = "cache-ttl")]
        cache_ttl: Option<u64>,
    },
    /// Scan explicit targets (IPs or CIDRs) instead of the local subnet.
    Hosts {
        /// Target IP or CIDR; repeatable.
        #[arg(long = "target", required = true)]
        targets: Vec<String>,
        /// Use UDP discovery instead of a plain TCP sweep.
        #[arg(long, default_value_t = false)]
        discovery: bool,
        #[command(flatten)]
        scan: ScanArgs,
    },
}

#[derive(Debug, Clone, Args)]
struct ScanArgs {
    /// Ports to scan, e.g. `19800-19899` or `19812,19813`.
    #[arg(long)]
    ports: Option<String>,

    /// Per-probe timeout in milliseconds.
    #[arg(long = "timeout-ms")]
    timeout_ms: Option<u64>,

    /// Hosts per batch.
    #[arg(long = "batch-size")]
    batch_size: Option<usize>,
}

impl ScanArgs {
    fn apply(&self, mut opts: ScanOptions) -> Result<ScanOptions> {
        if let Some(spec) = self.ports.as_deref() {
            opts.ports = parse_port_spec(spec)?;
        }
        if let Some(ms) = self.timeout_ms {
            opts.timeout = Duration::from_millis(ms);
        }
        if let Some(n) = self.batch_size {
            opts.batch_size = n.max(1);
        }
        Ok(opts)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = match cli.config.as_deref() {
        Some(path) => ScanConfig::load_from_path(path)?,
        None => ScanConfig::default(),
    };

    // Ctrl-C stops the scan at the next batch boundary.
    let cancel = CancellationToken::new();
    let cancel_ctrlc = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        cancel_ctrlc.cancel();
    });

    match &cli.command {
        Command::Subnet => {
            let info = netdetect::require_local_network()?;
            println!("local ip     : {}", info.local_ip);
            println!("netmask      : {}", info.netmask);
            if let Some(cidr) = info.cidr() {
                println!("cidr         : {cidr}");
            }
            println!("network      : {}", info.network_address);
            println!("broadcast    : {}", info.broadcast_address);
            println!("host range   : {} - {}", info.first_host, info.last_host);
            println!("total hosts  : {}", info.total_hosts);
            println!("scan targets : {}", netdetect::enumerate_hosts(&info).len());
        }
        Command::Tcp(args) => {
            let opts = args.apply(config.tcp_options())?;
            let scanner = Scanner::with_cancel(cancel.clone());
            let (tx, logger) = spawn_progress_logger::<PortProbeResult>("tcp");
            let outcome = scanner.scan_subnet_tcp(&opts, Some(tx)).await;
            let _ = logger.await;
            let outcome = outcome?;
            print_probe_table(&outcome);
            write_output(cli.output.as_deref(), &outcome);
        }
        Command::Discover {
            scan,
            watch,
            cache_ttl,
        } => {
            let opts = scan.apply(config.discovery_options())?;
            let ttl = cache_ttl.unwrap_or(config.cache_ttl_secs);
            match watch {
                Some(interval) => {
                    let every = Duration::from_secs((*interval).max(1));
                    watch_discovery(&opts, ttl, every, &cancel, cli.output.as_deref()).await?
                }
                None => {
                    let outcome = run_discovery(&opts, &cancel).await?;
                    print_server_table(&outcome.results);
                    write_output(cli.output.as_deref(), &outcome);
                }
            }
        }
        Command::Hosts {
            targets,
            discovery,
            scan,
        } => {
            let hosts = netdetect::parse_targets(targets)?;
            let scanner = Scanner::with_cancel(cancel.clone());
            if *discovery {
                let opts = scan.apply(config.discovery_options())?;
                let (tx, logger) = spawn_progress_logger::<DiscoveredServer>("discovery");
                let outcome = scanner.discover_hosts(&hosts, &opts, Some(tx)).await;
                let _ = logger.await;
                print_server_table(&outcome.results);
                write_output(cli.output.as_deref(), &outcome);
            } else {
                let opts = scan.apply(config.tcp_options())?;
                let (tx, logger) = spawn_progress_logger::<PortProbeResult>("tcp");
                let outcome = scanner.scan_hosts(&hosts, &opts, Some(tx)).await;
                let _ = logger.await;
                print_probe_table(&outcome);
                write_output(cli.output.as_deref(), &outcome);
            }
        }
    }

    Ok(())
}

async fn run_discovery(
    opts: &ScanOptions,
    cancel: &CancellationToken,
) -> Result<ScanOutcome<DiscoveredServer>> {
    let scanner = Scanner::with_cancel(cancel.child_token());
    let (tx, logger) = spawn_progress_logger::<DiscoveredServer>("discovery");
    let outcome = scanner.scan_subnet_discovery(opts, Some(tx)).await;
    let _ = logger.await;
    Ok(outcome?)
}

/// Re-scan only when the cached result set has gone stale.
async fn watch_discovery(
    opts: &ScanOptions,
    ttl_secs: u64,
    interval: Duration,
    cancel: &CancellationToken,
    output: Option<&Path>,
) -> Result<()> {
    let cache = ScanCache::new();
    loop {
        if cache.is_stale(ttl_secs) {
            let outcome = run_discovery(opts, cancel).await?;
            if outcome.state == ScanState::Cancelled {
                break;
            }
            print_server_table(&outcome.results);
            cache.set(outcome.results);
            if let Some(entry) = cache.get() {
                let snapshot = serde_json::json!({
                    "scanned_at": entry.scanned_at(),
                    "servers": entry.servers,
                });
                write_output(output, &snapshot);
            }
        } else if let Some(entry) = cache.get() {
            println!(
                "{} server(s) cached, scanned at {} ({})",
                entry.servers.len(),
                entry.scanned_at(),
                cache.age().unwrap_or_default()
            );
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
    cache.clear();
    Ok(())
}

fn spawn_progress_logger<T: Send + 'static>(label: &'static str) -> (ProgressSender<T>, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<ScanProgress<T>>();
    let handle = tokio::spawn(async move {
        while let Some(p) = rx.recv().await {
            info!(scan = label, scanned = p.scanned, total = p.total, found = p.results.len(), "progress");
        }
    });
    (tx, handle)
}

fn print_probe_table(outcome: &ScanOutcome<PortProbeResult>) {
    let ip_w = outcome
        .results
        .iter()
        .map(|r| r.host.to_string().len())
        .max()
        .unwrap_or(0)
        .max("host".len());

    println!(
        "\nOpen ports: {} (scanned {}/{}, {:?})",
        outcome.results.len(),
        outcome.scanned,
        outcome.total,
        outcome.state
    );
    println!("{:<ip_w$}  {:>5}  {:>10}", "host", "port", "latency_ms");
    println!("{:-<ip_w$}  {:-<5}  {:-<10}", "", "", "");
    for r in &outcome.results {
        println!(
            "{:<ip_w$}  {:>5}  {:>10}",
            r.host.to_string(),
            r.port,
            r.response_time_ms.unwrap_or_default()
        );
    }
}

fn print_server_table(servers: &[DiscoveredServer]) {
    let ip_w = servers
        .iter()
        .map(|s| s.host.to_string().len())
        .max()
        .unwrap_or(0)
        .max("host".len());

    println!("\nServers found: {}", servers.len());
    println!(
        "{:<ip_w$}  {:>5}  {:<20}  {:<20}  related",
        "host", "port", "machine", "database"
    );
    println!("{:-<ip_w$}  {:-<5}  {:-<20}  {:-<20}  {:-<7}", "", "", "", "", "");
    for s in servers {
        let (machine, database) = s
            .discovery_info
            .as_ref()
            .map(|i| (i.host.as_str(), i.database.as_str()))
            .unwrap_or(("", ""));
        let related: Vec<String> = s.related_ports.iter().map(u16::to_string).collect();
        println!(
            "{:<ip_w$}  {:>5}  {:<20}  {:<20}  {}",
            s.host.to_string(),
            s.port,
            machine,
            database,
            related.join(",")
        );
    }
}

fn write_output<T: Serialize>(path: Option<&Path>, value: &T) {
    let Some(path) = path else {
        return;
    };
    match write_results_json(path, value) {
        Ok(()) => println!("Wrote JSON results to {}", path.display()),
        Err(e) => warn!("failed to write JSON to {}: {e}", path.display()),
    }
}

fn write_results_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, value)?;
    Ok(())
}
