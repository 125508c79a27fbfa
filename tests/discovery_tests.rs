use lan_discover_rs::discovery::{discover, discovery_packet};
use std::net::{IpAddr, Ipv4Addr};
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;

const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// Fake server answering each well-formed discovery request with `reply`.
async fn spawn_responder(reply: Vec<u8>) -> u16 {
    let sock = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = sock.local_addr().unwrap().port();
    tokio::spawn(async move {
        let mut buf = [0u8; 512];
        while let Ok((n, from)) = sock.recv_from(&mut buf).await {
            if buf[..n] == discovery_packet()[..] {
                let _ = sock.send_to(&reply, from).await;
            }
        }
    });
    port
}

#[tokio::test]
async fn discovers_framed_json_reply() {
    let mut reply = b"\x02\x00hdr".to_vec();
    reply.extend_from_slice(
        br#"{"host":"srv-a","service":"4D Server","database":"Sales","port":19813}"#,
    );
    reply.push(0);
    let port = spawn_responder(reply).await;

    let info = discover(LOCALHOST, port, Duration::from_millis(1000))
        .await
        .expect("reply parsed");
    assert_eq!(info.host, "srv-a");
    assert_eq!(info.service, "4D Server");
    assert_eq!(info.database, "Sales");
    assert_eq!(info.port, 19813);
}

#[tokio::test]
async fn malformed_reply_is_absent() {
    let port = spawn_responder(b"garbage{not json".to_vec()).await;
    assert!(discover(LOCALHOST, port, Duration::from_millis(1000)).await.is_none());
}

#[tokio::test]
async fn silent_server_times_out() {
    // Bound but never answers.
    let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = silent.local_addr().unwrap().port();

    let start = Instant::now();
    assert!(discover(LOCALHOST, port, Duration::from_millis(200)).await.is_none());
    assert!(start.elapsed() < Duration::from_secs(2));
    drop(silent);
}

#[tokio::test]
async fn reply_from_another_port_is_accepted() {
    // Listens on one socket, answers from a second one.
    let listen = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = listen.local_addr().unwrap().port();
    let answer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    tokio::spawn(async move {
        let mut buf = [0u8; 512];
        if let Ok((_, from)) = listen.recv_from(&mut buf).await {
            let reply = br#"{"host":"srv-c","service":"4D Server","database":"HR","port":19820}"#;
            let _ = answer.send_to(reply, from).await;
        }
    });

    let info = discover(LOCALHOST, port, Duration::from_millis(1000))
        .await
        .expect("reply accepted from a different source port");
    assert_eq!(info.database, "HR");
    assert_eq!(info.port, 19820);
}
