//! Hub discovery.
//!
//! Strategies run in order and the first hub that answers wins; later
//! responders in the same round are ignored. A caller that gives up early can
//! simply drop the future returned by [`Discovery::discover`].

mod broadcast;
mod multicast;
mod scanner;

use common::{HubConfig, HubError, Result};
use log::{info, warn};
use std::fmt;
use std::net::Ipv4Addr;

use crate::transport::UdpTransport;

pub use broadcast::broadcast_probe;
pub use multicast::listen_for_hub;
pub use scanner::{probe_host, sweep_subnet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryStrategy {
    /// Probe the configured last-known address.
    Direct,
    /// Probe every host of the configured /24.
    Sweep,
    Broadcast,
    Multicast,
}

impl fmt::Display for DiscoveryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiscoveryStrategy::Direct => "direct",
            DiscoveryStrategy::Sweep => "sweep",
            DiscoveryStrategy::Broadcast => "broadcast",
            DiscoveryStrategy::Multicast => "multicast",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveredHub {
    pub addr: Ipv4Addr,
    pub via: DiscoveryStrategy,
}

pub struct Discovery {
    config: HubConfig,
    transport: UdpTransport,
    strategies: Vec<DiscoveryStrategy>,
}

impl Discovery {
    pub fn new(config: HubConfig) -> Self {
        let transport = UdpTransport::new(&config);
        Self {
            config,
            transport,
            strategies: vec![
                DiscoveryStrategy::Direct,
                DiscoveryStrategy::Sweep,
                DiscoveryStrategy::Broadcast,
                DiscoveryStrategy::Multicast,
            ],
        }
    }

    pub fn with_strategies(mut self, strategies: Vec<DiscoveryStrategy>) -> Self {
        self.strategies = strategies;
        self
    }

    pub async fn discover(&self) -> Result<DiscoveredHub> {
        for strategy in &self.strategies {
            match self.run(*strategy).await {
                Ok(Some(addr)) => {
                    info!("Hub discovered via {} at {}", strategy, addr);
                    return Ok(DiscoveredHub { addr, via: *strategy });
                }
                Ok(None) => info!("No hub found via {}", strategy),
                Err(e) => warn!("Discovery via {} failed: {}", strategy, e),
            }
        }
        Err(HubError::NotFound)
    }

    async fn run(&self, strategy: DiscoveryStrategy) -> Result<Option<Ipv4Addr>> {
        match strategy {
            DiscoveryStrategy::Direct => match self.config.host {
                Some(host) => Ok(probe_host(&self.transport, &self.config, host)
                    .await
                    .then_some(host)),
                None => Ok(None),
            },
            DiscoveryStrategy::Sweep => match self.config.subnet {
                Some(subnet) => {
                    Ok(sweep_subnet(&self.transport, &self.config, subnet, self.config.host).await)
                }
                None => Ok(None),
            },
            DiscoveryStrategy::Broadcast => broadcast_probe(&self.config).await,
            DiscoveryStrategy::Multicast => listen_for_hub(&self.config).await,
        }
    }
}
