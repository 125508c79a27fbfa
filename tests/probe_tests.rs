use lan_discover_rs::probe::{probe, probe_many};
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use tokio::net::TcpListener;

const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// A port that was free a moment ago.
async fn closed_port() -> u16 {
    let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
    l.local_addr().unwrap().port()
}

#[tokio::test]
async fn open_port_reports_latency() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let r = probe(LOCALHOST, port, Duration::from_millis(500)).await;
    assert!(r.is_open);
    assert_eq!(r.port, port);
    assert!(r.response_time_ms.is_some());
}

#[tokio::test]
async fn closed_port_has_no_latency() {
    let port = closed_port().await;
    let r = probe(LOCALHOST, port, Duration::from_millis(500)).await;
    assert!(!r.is_open);
    assert!(r.response_time_ms.is_none());
}

#[tokio::test]
async fn probe_many_keeps_open_only() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let open = listener.local_addr().unwrap().port();
    let closed = closed_port().await;

    let results = probe_many(LOCALHOST, &[closed, open], Duration::from_millis(500)).await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].port, open);
}
