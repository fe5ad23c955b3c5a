use common::protocol::codec;
use common::{HubConfig, Message, Result};
use log::debug;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};
use tokio::time::Instant;

use crate::transport::{bind_socket, recv_until};

/// Broadcasts a `GetDeviceList` on the unicast port and returns the first
/// host that answers with a decodable message.
pub async fn broadcast_probe(config: &HubConfig) -> Result<Option<Ipv4Addr>> {
    let socket = bind_socket(config.local_port).await?;
    socket.set_broadcast(true)?;

    let target = SocketAddr::V4(SocketAddrV4::new(broadcast_addr(config.subnet), config.unicast_port));
    let probe = codec::encode(&Message::get_device_list())?;
    socket.send_to(&probe, target).await?;
    debug!("Broadcast probe sent to {}", target);

    let deadline = Instant::now() + config.discovery_timeout;
    let mut buf = vec![0u8; config.max_packet_size];
    while let Some((len, src)) = recv_until(&socket, &mut buf, deadline).await? {
        match (codec::decode(&buf[..len]), src.ip()) {
            (Ok(_), IpAddr::V4(ip)) => return Ok(Some(ip)),
            (Ok(_), IpAddr::V6(ip)) => debug!("Ignoring IPv6 responder {}", ip),
            (Err(e), _) => debug!("Ignoring broadcast reply from {}: {}", src, e),
        }
    }
    Ok(None)
}

/// The directed broadcast of the configured /24, or the limited broadcast.
fn broadcast_addr(subnet: Option<Ipv4Addr>) -> Ipv4Addr {
    match subnet {
        Some(subnet) => {
            let [a, b, c, _] = subnet.octets();
            Ipv4Addr::new(a, b, c, 255)
        }
        None => Ipv4Addr::BROADCAST,
    }
}
