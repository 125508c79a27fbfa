use lan_discover_rs::netdetect::{compute_subnet, enumerate_hosts, expand_cidr_to_ips};
use std::net::{IpAddr, Ipv4Addr};

#[test]
fn slash24_arithmetic() {
    let info = compute_subnet(Ipv4Addr::new(192, 168, 1, 50), Ipv4Addr::new(255, 255, 255, 0));
    assert_eq!(info.network_address, Ipv4Addr::new(192, 168, 1, 0));
    assert_eq!(info.broadcast_address, Ipv4Addr::new(192, 168, 1, 255));
    assert_eq!(info.first_host, Ipv4Addr::new(192, 168, 1, 1));
    assert_eq!(info.last_host, Ipv4Addr::new(192, 168, 1, 254));
    assert_eq!(info.total_hosts, 254);

    let hosts = enumerate_hosts(&info);
    assert_eq!(hosts.len(), 254);
    assert_eq!(hosts[0], Ipv4Addr::new(192, 168, 1, 1));
    assert_eq!(hosts[253], Ipv4Addr::new(192, 168, 1, 254));
}

#[test]
fn host_mask_is_clamped_to_zero() {
    let info = compute_subnet(Ipv4Addr::new(192, 168, 1, 50), Ipv4Addr::new(255, 255, 255, 255));
    assert_eq!(info.total_hosts, 0);
    assert!(enumerate_hosts(&info).is_empty());
}

#[test]
fn host_mask_on_broadcast_octet_enumerates_nothing() {
    // first/last wrap around inside the octet; the clamp must still win
    let info = compute_subnet(Ipv4Addr::new(10, 0, 0, 255), Ipv4Addr::new(255, 255, 255, 255));
    assert!(enumerate_hosts(&info).is_empty());
}

#[test]
fn large_subnet_degrades_to_local_slash24() {
    let info = compute_subnet(Ipv4Addr::new(10, 20, 30, 40), Ipv4Addr::new(255, 255, 0, 0));
    assert_eq!(info.total_hosts, 65534);
    assert_eq!(info.first_host, Ipv4Addr::new(10, 20, 0, 1));
    assert_eq!(info.last_host, Ipv4Addr::new(10, 20, 255, 254));

    let hosts = enumerate_hosts(&info);
    assert_eq!(hosts.len(), 254);
    assert_eq!(hosts[0], Ipv4Addr::new(10, 20, 30, 1));
    assert_eq!(hosts[253], Ipv4Addr::new(10, 20, 30, 254));
}

#[test]
fn small_subnet_enumerates_literally() {
    let info = compute_subnet(Ipv4Addr::new(192, 168, 7, 77), Ipv4Addr::new(255, 255, 255, 240));
    assert_eq!(info.network_address, Ipv4Addr::new(192, 168, 7, 64));
    assert_eq!(info.total_hosts, 14);
    let hosts = enumerate_hosts(&info);
    assert_eq!(hosts.first(), Some(&Ipv4Addr::new(192, 168, 7, 65)));
    assert_eq!(hosts.last(), Some(&Ipv4Addr::new(192, 168, 7, 78)));
}

#[test]
fn expand_excludes_network_and_broadcast() {
    let net: ipnet::IpNet = "10.0.0.0/30".parse().unwrap();
    assert_eq!(
        expand_cidr_to_ips(net),
        vec![
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2))
        ]
    );
}
