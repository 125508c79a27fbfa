//! UDP discovery handshake.
//!
//! The request is a fixed 96-byte datagram made of three zero-padded 32-byte
//! fields: a reserved block, the server tag and the negotiation tag. Servers
//! answer with a single datagram carrying a JSON object, possibly wrapped in
//! binary framing.

use crate::types::DiscoveryInfo;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time;
use tracing::trace;

/// Total request length.
pub const PACKET_LEN: usize = 96;
/// Width of each fixed field.
pub const FIELD_LEN: usize = 32;
pub const SERVER_TAG: &[u8] = b"4D Server V";
pub const NEGOTIATION_TAG: &[u8] = b"4DQuicNegociation";

/// Default wait for a discovery reply.
pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_millis(1000);

const SERVER_TAG_OFFSET: usize = FIELD_LEN;
const NEGOTIATION_TAG_OFFSET: usize = 2 * FIELD_LEN;
/// Largest IPv4 UDP payload.
const RECV_BUF_LEN: usize = 65_507;

/// Build the discovery request.
pub fn discovery_packet() -> [u8; PACKET_LEN] {
    let mut packet = [0u8; PACKET_LEN];
    packet[SERVER_TAG_OFFSET..SERVER_TAG_OFFSET + SERVER_TAG.len()].copy_from_slice(SERVER_TAG);
    packet[NEGOTIATION_TAG_OFFSET..NEGOTIATION_TAG_OFFSET + NEGOTIATION_TAG.len()]
        .copy_from_slice(NEGOTIATION_TAG);
    packet
}

/// Extract the identity from a reply payload.
///
/// Only the span from the first `{` to the last `}` is parsed, strictly.
/// Anything else (no braces, invalid JSON, missing fields, port 0) yields `None`.
pub fn parse_reply(payload: &[u8]) -> Option<DiscoveryInfo> {
    let text = String::from_utf8_lossy(payload);
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    let info: DiscoveryInfo = serde_json::from_str(&text[start..=end]).ok()?;
    (info.port != 0).then_some(info)
}

/// Send one discovery datagram to `host:port` and wait for one reply.
///
/// Timeouts, socket errors and malformed replies all yield `None`. The socket
/// is owned by this call and closed on every exit path.
pub async fn discover(host: IpAddr, port: u16, timeout: Duration) -> Option<DiscoveryInfo> {
    let target = SocketAddr::new(host, port);
    match time::timeout(timeout, exchange(target)).await {
        Ok(Ok(payload)) => {
            let info = parse_reply(&payload);
            if info.is_none() {
                trace!(%target, len = payload.len(), "unparsable discovery reply");
            }
            info
        }
        Ok(Err(e)) => {
            trace!(%target, "discovery exchange failed: {e}");
            None
        }
        Err(_) => {
            trace!(%target, "discovery timed out");
            None
        }
    }
}

/// Replies are accepted from any source port of the target host; datagrams
/// from other hosts are skipped.
async fn exchange(target: SocketAddr) -> std::io::Result<Vec<u8>> {
    let bind_addr = match target {
        SocketAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
        SocketAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
    };
    let socket = UdpSocket::bind(bind_addr).await?;
    socket.send_to(&discovery_packet(), target).await?;

    let mut buf = vec![0u8; RECV_BUF_LEN];
    loop {
        let (n, from) = socket.recv_from(&mut buf).await?;
        if from.ip() == target.ip() {
            buf.truncate(n);
            return Ok(buf);
        }
        trace!(%target, %from, "ignoring datagram from unexpected host");
    }
}
