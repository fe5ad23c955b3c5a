//! Request/reply over UDP.
//!
//! Every call binds a fresh socket, sends one datagram and waits for one
//! reply until the deadline. There is no retry at this layer.

use common::protocol::codec;
use common::{HubConfig, HubError, Message, Result};
use log::debug;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{timeout_at, Instant};

#[derive(Debug, Clone)]
pub struct UdpTransport {
    local_port: u16,
    timeout: Duration,
    max_packet_size: usize,
    strict_correlation: bool,
}

impl UdpTransport {
    pub fn new(config: &HubConfig) -> Self {
        Self {
            local_port: config.local_port,
            timeout: config.request_timeout,
            max_packet_size: config.max_packet_size,
            strict_correlation: config.strict_correlation,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn request(&self, message: &Message, dest: SocketAddr) -> Result<Message> {
        self.request_with_timeout(message, dest, self.timeout).await
    }

    pub async fn request_with_timeout(
        &self,
        message: &Message,
        dest: SocketAddr,
        timeout: Duration,
    ) -> Result<Message> {
        let socket = bind_socket(self.local_port).await?;
        let payload = codec::encode(message)?;
        let kind = message.msg_type.as_ref().map(|t| t.as_str()).unwrap_or("?");

        debug!("TX {} -> {} ({} bytes)", kind, dest, payload.len());
        socket.send_to(&payload, dest).await?;

        let deadline = Instant::now() + timeout;
        let mut buf = vec![0u8; self.max_packet_size];
        loop {
            let (len, src) = match recv_until(&socket, &mut buf, deadline).await? {
                Some(received) => received,
                None => return Err(HubError::Timeout { addr: dest, waited: timeout }),
            };
            debug!("RX {} <- {} ({} bytes)", kind, src, len);

            if self.strict_correlation && src != dest {
                debug!("Ignoring reply from {}, expected {}", src, dest);
                continue;
            }

            let reply = match codec::decode(&buf[..len]) {
                Ok(reply) => reply,
                Err(e) if self.strict_correlation => {
                    debug!("Ignoring undecodable reply from {}: {}", src, e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            if !echoes_id(message, &reply) {
                if self.strict_correlation {
                    debug!(
                        "Ignoring reply with msgID {:?}, expected {:?}",
                        reply.msg_id, message.msg_id
                    );
                    continue;
                }
                debug!(
                    "Reply msgID {:?} does not match request {:?}, accepting anyway",
                    reply.msg_id, message.msg_id
                );
            }

            return Ok(reply);
        }
    }
}

/// Replies without a `msgID` count as matching.
fn echoes_id(request: &Message, reply: &Message) -> bool {
    match (&request.msg_id, &reply.msg_id) {
        (Some(sent), Some(echoed)) => sent == echoed,
        _ => true,
    }
}

pub(crate) async fn bind_socket(port: u16) -> Result<UdpSocket> {
    UdpSocket::bind(("0.0.0.0", port))
        .await
        .map_err(|e| HubError::NetworkError(format!("bind 0.0.0.0:{}: {}", port, e)))
}

/// Waits for one datagram. `Ok(None)` means the deadline passed.
pub(crate) async fn recv_until(
    socket: &UdpSocket,
    buf: &mut [u8],
    deadline: Instant,
) -> Result<Option<(usize, SocketAddr)>> {
    match timeout_at(deadline, socket.recv_from(buf)).await {
        Ok(Ok(received)) => Ok(Some(received)),
        Ok(Err(e)) => Err(HubError::NetworkError(e.to_string())),
        Err(_) => Ok(None),
    }
}
