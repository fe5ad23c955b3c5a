use common::{HubConfig, Message};
use log::debug;
use std::net::Ipv4Addr;

use crate::transport::UdpTransport;

/// Sends a `GetDeviceList` to `host` and reports whether a hub answered.
/// Only replies carrying a `data` field count.
pub async fn probe_host(transport: &UdpTransport, config: &HubConfig, host: Ipv4Addr) -> bool {
    let probe = Message::get_device_list();
    match transport
        .request_with_timeout(&probe, config.hub_addr(host), config.scan_timeout)
        .await
    {
        Ok(reply) if reply.has_data() => true,
        Ok(_) => {
            debug!("{} replied without device data", host);
            false
        }
        Err(e) => {
            debug!("No hub at {}: {}", host, e);
            false
        }
    }
}

/// Probes `.1` through `.254` of the /24 containing `subnet`, one host at a
/// time, skipping `skip` (usually an address already probed).
pub async fn sweep_subnet(
    transport: &UdpTransport,
    config: &HubConfig,
    subnet: Ipv4Addr,
    skip: Option<Ipv4Addr>,
) -> Option<Ipv4Addr> {
    let [a, b, c, _] = subnet.octets();
    log::info!("Scanning {}.{}.{}.0/24 for a hub", a, b, c);

    for host in subnet_hosts(subnet) {
        if Some(host) == skip {
            continue;
        }
        if probe_host(transport, config, host).await {
            return Some(host);
        }
    }
    None
}

fn subnet_hosts(subnet: Ipv4Addr) -> impl Iterator<Item = Ipv4Addr> {
    let [a, b, c, _] = subnet.octets();
    (1..=254u8).map(move |d| Ipv4Addr::new(a, b, c, d))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subnet_hosts_skip_network_and_broadcast() {
        let hosts: Vec<_> = subnet_hosts(Ipv4Addr::new(192, 168, 1, 77)).collect();
        assert_eq!(hosts.len(), 254);
        assert_eq!(hosts[0], Ipv4Addr::new(192, 168, 1, 1));
        assert_eq!(hosts[253], Ipv4Addr::new(192, 168, 1, 254));
    }
}
