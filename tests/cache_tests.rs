use lan_discover_rs::cache::ScanCache;
use lan_discover_rs::types::DiscoveredServer;
use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

fn server(last: u8, port: u16) -> DiscoveredServer {
    DiscoveredServer {
        host: IpAddr::V4(Ipv4Addr::new(192, 168, 1, last)),
        port,
        is_open: true,
        response_time_ms: Some(3),
        discovery_info: None,
        related_ports: BTreeSet::from([port]),
    }
}

#[test]
fn empty_cache_is_stale() {
    let cache = ScanCache::new();
    assert!(cache.get().is_none());
    assert!(cache.is_stale(120));
    assert!(cache.age().is_none());
}

#[test]
fn staleness_boundary() {
    let cache = ScanCache::new();
    let t = 1_700_000_000_000u64;
    cache.set_at(vec![server(10, 19812)], t);
    assert!(!cache.is_stale_at(t + 119_000, 120));
    assert!(!cache.is_stale_at(t + 120_000, 120));
    assert!(cache.is_stale_at(t + 121_000, 120));
}

#[test]
fn age_rendering() {
    let cache = ScanCache::new();
    let t = 1_700_000_000_000u64;
    cache.set_at(Vec::new(), t);
    let entry = cache.get().unwrap();
    assert_eq!(entry.age_at(t + 42_500), "42s ago");
    assert_eq!(entry.age_at(t + 150_000), "2m ago");
}

#[test]
fn set_replaces_and_clear_discards() {
    let cache = ScanCache::new();
    cache.set(vec![server(1, 19812), server(2, 19812)]);
    cache.set(vec![server(3, 19822)]);
    let entry = cache.get().unwrap();
    assert_eq!(entry.servers, vec![server(3, 19822)]);

    cache.clear();
    assert!(cache.get().is_none());
    assert!(cache.is_stale(120));
}

#[test]
fn concurrent_writers_and_readers() {
    let cache = Arc::new(ScanCache::new());
    let handles: Vec<_> = (0..8u8)
        .map(|i| {
            let cache = Arc::clone(&cache);
            std::thread::spawn(move || {
                for _ in 0..100 {
                    cache.set(vec![server(i, 19812)]);
                    let entry = cache.get().expect("entry present after set");
                    assert_eq!(entry.servers.len(), 1);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(cache.get().unwrap().servers.len(), 1);
}
