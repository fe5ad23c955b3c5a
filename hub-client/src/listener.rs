//! Background listener for unsolicited `Report` messages.
//!
//! The hub multicasts a report whenever a device changes state, for example
//! after a blind was moved by hand. The listener merges each report into the
//! [`DeviceRegistry`] and then hands it to an optional callback.
//!
//! Bad datagrams are logged and dropped. Only failing to bind or join the
//! group is fatal, and that surfaces from [`ReportListener::bind`].

use common::protocol::codec;
use common::{HubConfig, HubError, Message, MsgType, Result, RoleUpdate, StatusFields};
use log::{debug, error, info, warn};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::registry::DeviceRegistry;

/// A report after it has been applied to the registry.
#[derive(Debug, Clone)]
pub struct ReportEvent {
    pub mac: String,
    pub status: StatusFields,
    /// Role values written to the registry; empty for unknown devices.
    pub updates: Vec<RoleUpdate>,
    pub source: SocketAddr,
}

/// Pause after a receive error so a broken socket does not spin the loop.
const RECV_ERROR_BACKOFF: Duration = Duration::from_secs(1);

pub type ReportCallback = Arc<dyn Fn(&ReportEvent) + Send + Sync>;

pub struct ReportListener {
    socket: UdpSocket,
    group: Option<Ipv4Addr>,
    registry: DeviceRegistry,
    callback: Option<ReportCallback>,
    max_packet_size: usize,
}

impl ReportListener {
    /// Binds the multicast port and joins the hub's group.
    pub async fn bind(config: &HubConfig, registry: DeviceRegistry) -> Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", config.multicast_port))
            .await
            .map_err(|e| {
                HubError::NetworkError(format!("bind multicast port {}: {}", config.multicast_port, e))
            })?;
        socket
            .join_multicast_v4(config.multicast_addr, Ipv4Addr::UNSPECIFIED)
            .map_err(|e| {
                HubError::NetworkError(format!("join {}: {}", config.multicast_addr, e))
            })?;

        info!("Report listener joined {}", config.multicast_group());
        Ok(Self {
            socket,
            group: Some(config.multicast_addr),
            registry,
            callback: None,
            max_packet_size: config.max_packet_size,
        })
    }

    /// Listens on an already bound socket without joining any group.
    pub fn from_socket(socket: UdpSocket, registry: DeviceRegistry) -> Self {
        Self {
            socket,
            group: None,
            registry,
            callback: None,
            max_packet_size: HubConfig::default().max_packet_size,
        }
    }

    pub fn with_callback(mut self, callback: ReportCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn spawn(self) -> ReportListenerHandle {
        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(self.run(stop_rx));
        ReportListenerHandle { stop: Some(stop_tx), task }
    }

    async fn run(self, mut stop: oneshot::Receiver<()>) {
        let mut buf = vec![0u8; self.max_packet_size];
        loop {
            tokio::select! {
                // Fires on an explicit stop and when the handle is dropped.
                _ = &mut stop => break,
                received = self.socket.recv_from(&mut buf) => match received {
                    Ok((len, src)) => {
                        if let Some(event) = self.handle_datagram(&buf[..len], src) {
                            if let Some(callback) = &self.callback {
                                callback(&event);
                            }
                        }
                    }
                    Err(e) => {
                        error!("Error receiving report: {}", e);
                        if stop_requested(&mut stop, RECV_ERROR_BACKOFF).await {
                            break;
                        }
                    }
                }
            }
        }

        if let Some(group) = self.group {
            if let Err(e) = self.socket.leave_multicast_v4(group, Ipv4Addr::UNSPECIFIED) {
                warn!("Failed to leave multicast group {}: {}", group, e);
            }
        }
        info!("Report listener stopped");
    }

    fn handle_datagram(&self, datagram: &[u8], src: SocketAddr) -> Option<ReportEvent> {
        let msg = match codec::decode(datagram) {
            Ok(msg) => msg,
            Err(e) => {
                debug!("Dropping datagram from {}: {}", src, e);
                return None;
            }
        };
        if !msg.is(&MsgType::Report) {
            debug!("Ignoring {:?} from {}", msg.msg_type, src);
            return None;
        }
        match parse_report(&msg) {
            Ok((mac, status)) => {
                let updates = match self.registry.apply_status(&mac, &status) {
                    Ok(updates) => updates,
                    Err(e) => {
                        debug!("Report not applied: {}", e);
                        Vec::new()
                    }
                };
                Some(ReportEvent { mac, status, updates, source: src })
            }
            Err(e) => {
                debug!("Dropping report from {}: {}", src, e);
                None
            }
        }
    }
}

/// Waits out `backoff`, returning early with `true` if a stop arrives.
async fn stop_requested(stop: &mut oneshot::Receiver<()>, backoff: Duration) -> bool {
    tokio::select! {
        _ = stop => true,
        _ = tokio::time::sleep(backoff) => false,
    }
}

fn parse_report(msg: &Message) -> Result<(String, StatusFields)> {
    let mac = msg
        .mac
        .clone()
        .ok_or_else(|| HubError::MalformedResponse("report without mac".to_string()))?;
    Ok((mac, msg.status_fields()?))
}

/// Owns the listener task. Dropping the handle also stops the listener.
pub struct ReportListenerHandle {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ReportListenerHandle {
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Signals the listener to leave its group and waits for it to exit.
    pub async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Err(e) = (&mut self.task).await {
            warn!("Report listener task ended abnormally: {}", e);
        }
    }
}
