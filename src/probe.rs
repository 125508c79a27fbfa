use crate::types::PortProbeResult;
use futures::future::join_all;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{self, Instant};
use tracing::trace;

/// Default TCP connect timeout.
pub const DEFAULT_TCP_TIMEOUT: Duration = Duration::from_millis(500);

/// One TCP connect attempt bounded by `timeout`.
///
/// Never fails: refusal, timeout and socket errors all produce a closed result.
/// The stream is dropped before returning on every path.
pub async fn probe(host: IpAddr, port: u16, timeout: Duration) -> PortProbeResult {
    let addr = SocketAddr::new(host, port);
    let start = Instant::now();
    let response_time_ms = match time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => {
            let elapsed = start.elapsed().as_millis() as u64;
            drop(stream);
            Some(elapsed)
        }
        Ok(Err(e)) => {
            trace!(%addr, "connect failed: {e}");
            None
        }
        Err(_) => {
            trace!(%addr, "connect timed out");
            None
        }
    };

    PortProbeResult {
        host,
        port,
        is_open: response_time_ms.is_some(),
        response_time_ms,
    }
}

/// Probe every port on `host` concurrently and keep only the open ones.
pub async fn probe_many(host: IpAddr, ports: &[u16], timeout: Duration) -> Vec<PortProbeResult> {
    join_all(ports.iter().map(|&port| probe(host, port, timeout)))
        .await
        .into_iter()
        .filter(|r| r.is_open)
        .collect()
}
