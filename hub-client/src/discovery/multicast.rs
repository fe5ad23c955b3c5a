use common::protocol::codec;
use common::{HubConfig, HubError, MsgType, Result};
use log::debug;
use std::net::{IpAddr, Ipv4Addr};
use tokio::net::UdpSocket;
use tokio::time::Instant;

use crate::transport::recv_until;

/// Joins the hub's multicast group and waits for a `Gateway` or `Report`
/// message; its sender is the hub.
pub async fn listen_for_hub(config: &HubConfig) -> Result<Option<Ipv4Addr>> {
    let socket = UdpSocket::bind(("0.0.0.0", config.multicast_port))
        .await
        .map_err(|e| HubError::NetworkError(format!("bind multicast port {}: {}", config.multicast_port, e)))?;
    socket.join_multicast_v4(config.multicast_addr, Ipv4Addr::UNSPECIFIED)?;
    debug!("Listening on {} for hub beacons", config.multicast_group());

    let deadline = Instant::now() + config.discovery_timeout;
    let mut buf = vec![0u8; config.max_packet_size];
    let mut found = None;
    while let Some((len, src)) = recv_until(&socket, &mut buf, deadline).await? {
        let Ok(msg) = codec::decode(&buf[..len]) else {
            debug!("Ignoring undecodable multicast datagram from {}", src);
            continue;
        };
        if msg.is(&MsgType::Gateway) || msg.is(&MsgType::Report) {
            if let IpAddr::V4(ip) = src.ip() {
                found = Some(ip);
                break;
            }
        }
    }

    if let Err(e) = socket.leave_multicast_v4(config.multicast_addr, Ipv4Addr::UNSPECIFIED) {
        debug!("Failed to leave multicast group: {}", e);
    }
    Ok(found)
}
