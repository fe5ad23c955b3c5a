//! The hub session: one hub address, one registry, one access token.
//!
//! Calls are expected one at a time from a single caller. The report
//! listener runs alongside and only ever touches the shared registry.

use common::encryption::{derive_access_token, SharedKey};
use common::{
    DeviceRecord, HubConfig, HubError, Message, Result, StatusFields, WriteCommand,
};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use crate::discovery::Discovery;
use crate::listener::{ReportCallback, ReportEvent, ReportListener, ReportListenerHandle};
use crate::registry::DeviceRegistry;
use crate::transport::UdpTransport;

/// Outcome of one [`HubSession::poll_all`] sweep.
#[derive(Debug, Default)]
pub struct PollReport {
    pub succeeded: BTreeMap<String, StatusFields>,
    pub failed: BTreeMap<String, HubError>,
}

impl PollReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct HubSession {
    config: HubConfig,
    host: Ipv4Addr,
    transport: UdpTransport,
    registry: DeviceRegistry,
    gateway_token: Option<String>,
    access_token: Option<String>,
}

impl HubSession {
    pub fn new(host: Ipv4Addr, config: HubConfig) -> Self {
        Self {
            transport: UdpTransport::new(&config),
            access_token: config.access_token.clone(),
            config,
            host,
            registry: DeviceRegistry::new(),
            gateway_token: None,
        }
    }

    /// Discovers the hub, falling back to the configured last-known address.
    pub async fn connect(config: HubConfig) -> Result<Self> {
        let discovery = Discovery::new(config.clone());
        Self::connect_with(config, &discovery).await
    }

    /// Like [`connect`](Self::connect) with a caller-built [`Discovery`].
    pub async fn connect_with(config: HubConfig, discovery: &Discovery) -> Result<Self> {
        let host = match discovery.discover().await {
            Ok(found) => found.addr,
            Err(HubError::NotFound) => match config.host {
                Some(fallback) => {
                    warn!("Hub not discovered, using fallback address {}", fallback);
                    fallback
                }
                None => return Err(HubError::NotFound),
            },
            Err(e) => return Err(e),
        };
        Ok(Self::new(host, config))
    }

    pub fn host(&self) -> Ipv4Addr {
        self.host
    }

    pub fn hub_addr(&self) -> SocketAddr {
        self.config.hub_addr(self.host)
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn gateway_token(&self) -> Option<&str> {
        self.gateway_token.as_deref()
    }

    /// Fetches the device list and rebuilds the registry from it.
    ///
    /// The access token is derived from the reply's gateway token. A
    /// derivation failure is logged, not returned: listing still works, but
    /// writes fail with `NoToken` until it is fixed.
    pub async fn list_devices(&mut self) -> Result<Vec<DeviceRecord>> {
        let reply = self
            .transport
            .request(&Message::get_device_list(), self.hub_addr())
            .await?;
        let entries = reply.device_entries()?;
        let devices = self.registry.replace_all(entries);

        self.gateway_token = reply.token.clone();
        if self.config.access_token.is_none() {
            self.access_token = None;
        }
        if let Err(e) = self.generate_access_token() {
            warn!("Access token unavailable: {}", e);
        }

        info!("{} devices discovered", devices.len());
        Ok(devices)
    }

    /// Computes the access token, or takes the pre-derived one verbatim.
    pub fn generate_access_token(&mut self) -> Result<&str> {
        let token = match &self.config.access_token {
            Some(secret) => {
                debug!("Using pre-derived access token");
                secret.clone()
            }
            None => {
                let key = self.config.shared_key.as_deref().ok_or_else(|| {
                    HubError::NoToken("no shared key or pre-derived token configured".to_string())
                })?;
                let gateway_token = self.gateway_token.as_deref().ok_or_else(|| {
                    HubError::NoToken("hub has not issued a gateway token yet".to_string())
                })?;
                let key = SharedKey::try_from(key)?;
                derive_access_token(&key, gateway_token)?
            }
        };
        Ok(self.access_token.insert(token).as_str())
    }

    /// Reads one device and merges the reply into the registry.
    pub async fn read_status(&self, mac: &str) -> Result<StatusFields> {
        let reply = self.read_raw(mac).await?;
        reply.status_fields()
    }

    /// Like [`read_status`](Self::read_status) but returns the whole reply.
    pub async fn read_raw(&self, mac: &str) -> Result<Message> {
        let device = self.registry.require(mac)?;
        let request = Message::read_device(&device.mac, &device.device_type);
        let reply = self.transport.request(&request, self.hub_addr()).await?;

        let status = reply.status_fields()?;
        self.registry.apply_status(mac, &status)?;
        Ok(reply)
    }

    /// Moves a blind. At least one target must be given and only the given
    /// targets are sent. The hub's acknowledgement is returned as-is.
    pub async fn set_value(
        &self,
        mac: &str,
        position: Option<u8>,
        angle: Option<u8>,
    ) -> Result<Message> {
        let device = self.registry.require(mac)?;
        if device.is_hub {
            return Err(HubError::InvalidSelection(format!(
                "{} is the hub and cannot be controlled",
                mac
            )));
        }
        let command = WriteCommand::new(position, angle)?;
        let token = self
            .access_token
            .as_deref()
            .ok_or_else(|| HubError::NoToken("access token has not been derived".to_string()))?;

        let request = Message::write_device(&device.mac, &device.device_type, token, &command)?;
        info!("Sending command to {}: {:?}", mac, command);
        let ack = self.transport.request(&request, self.hub_addr()).await?;
        debug!("Command acknowledged by {}: {:?}", mac, ack);
        Ok(ack)
    }

    /// Reads every controllable device in turn, pausing between requests.
    /// A failing device is recorded and the sweep carries on.
    pub async fn poll_all(&self) -> PollReport {
        let mut report = PollReport::default();
        let macs = self.registry.controllable();

        for (i, mac) in macs.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.config.poll_delay).await;
            }
            match self.read_status(mac).await {
                Ok(status) => {
                    debug!("Polled {}", mac);
                    report.succeeded.insert(mac.clone(), status);
                }
                Err(e) => {
                    warn!("Failed to poll {}: {}", mac, e);
                    report.failed.insert(mac.clone(), e);
                }
            }
        }

        info!(
            "Poll finished: {} ok, {} failed",
            report.succeeded.len(),
            report.failed.len()
        );
        report
    }

    /// Starts the report listener on the configured multicast group. It
    /// shares this session's registry.
    pub async fn start_report_listener(
        &self,
        callback: Option<ReportCallback>,
    ) -> Result<ReportListenerHandle> {
        let mut listener = ReportListener::bind(&self.config, self.registry.clone()).await?;
        if let Some(callback) = callback {
            listener = listener.with_callback(callback);
        }
        Ok(listener.spawn())
    }
}

/// Convenience for callers that only want to print reports.
pub fn log_reports() -> ReportCallback {
    Arc::new(|event: &ReportEvent| {
        info!("REPORT {} {:?}", event.mac, event.status);
    })
}
