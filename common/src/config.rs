use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::str::FromStr;
use std::time::Duration;
use crate::error::{HubError, Result};
use crate::protocol::{MULTICAST_ADDR, MULTICAST_PORT, UNICAST_PORT};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// Last known hub address; probed first during discovery and used as a
    /// fallback when discovery finds nothing.
    pub host: Option<Ipv4Addr>,
    pub shared_key: Option<String>,
    /// Pre-derived access token. When set, derivation is skipped.
    pub access_token: Option<String>,
    /// Any address inside the /24 to sweep during discovery.
    pub subnet: Option<Ipv4Addr>,
    pub unicast_port: u16,
    pub multicast_addr: Ipv4Addr,
    pub multicast_port: u16,
    pub local_port: u16,
    pub request_timeout: Duration,
    pub scan_timeout: Duration,
    pub discovery_timeout: Duration,
    pub poll_delay: Duration,
    pub max_packet_size: usize,
    pub strict_correlation: bool,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            host: None,
            shared_key: None,
            access_token: None,
            subnet: None,
            unicast_port: UNICAST_PORT,
            multicast_addr: MULTICAST_ADDR,
            multicast_port: MULTICAST_PORT,
            local_port: 0,
            request_timeout: Duration::from_secs(3),
            scan_timeout: Duration::from_millis(500),
            discovery_timeout: Duration::from_secs(5),
            poll_delay: Duration::from_millis(100),
            max_packet_size: 4096,
            strict_correlation: false,
        }
    }
}

impl HubConfig {
    /// Defaults overlaid with `BREL_*` environment variables.
    pub fn load() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = var("BREL_HOST") {
            config.host = Some(parse_var("BREL_HOST", &v)?);
        }
        if let Some(v) = var("BREL_KEY") {
            config.shared_key = Some(v);
        }
        if let Some(v) = var("BREL_TOKEN") {
            config.access_token = Some(v);
        }
        if let Some(v) = var("BREL_SUBNET") {
            config.subnet = Some(parse_var("BREL_SUBNET", &v)?);
        }
        if let Some(v) = var("BREL_UNICAST_PORT") {
            config.unicast_port = parse_var("BREL_UNICAST_PORT", &v)?;
        }
        if let Some(v) = var("BREL_MULTICAST_ADDR") {
            config.multicast_addr = parse_var("BREL_MULTICAST_ADDR", &v)?;
        }
        if let Some(v) = var("BREL_MULTICAST_PORT") {
            config.multicast_port = parse_var("BREL_MULTICAST_PORT", &v)?;
        }
        if let Some(v) = var("BREL_LOCAL_PORT") {
            config.local_port = parse_var("BREL_LOCAL_PORT", &v)?;
        }
        if let Some(v) = var("BREL_REQUEST_TIMEOUT_MS") {
            config.request_timeout = parse_millis("BREL_REQUEST_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = var("BREL_SCAN_TIMEOUT_MS") {
            config.scan_timeout = parse_millis("BREL_SCAN_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = var("BREL_DISCOVERY_TIMEOUT_MS") {
            config.discovery_timeout = parse_millis("BREL_DISCOVERY_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = var("BREL_POLL_DELAY_MS") {
            config.poll_delay = parse_millis("BREL_POLL_DELAY_MS", &v)?;
        }
        if let Some(v) = var("BREL_STRICT_CORRELATION") {
            config.strict_correlation = matches!(v.to_lowercase().as_str(), "1" | "true" | "yes");
        }

        Ok(config)
    }

    /// A session needs something to authorise writes with.
    pub fn validate(&self) -> Result<()> {
        if self.shared_key.is_none() && self.access_token.is_none() {
            return Err(HubError::ConfigError(
                "either a 16-byte key or a pre-derived access token is required".to_string(),
            ));
        }
        Ok(())
    }

    pub fn hub_addr(&self, host: Ipv4Addr) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(host, self.unicast_port))
    }

    pub fn multicast_group(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.multicast_addr, self.multicast_port))
    }
}

fn parse_var<T>(name: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| HubError::ConfigError(format!("{}={}: {}", name, value, e)))
}

fn parse_millis(name: &str, value: &str) -> Result<Duration> {
    parse_var::<u64>(name, value).map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_match_hub_protocol() {
        let config = HubConfig::default();
        assert_eq!(config.unicast_port, 32100);
        assert_eq!(config.multicast_port, 32101);
        assert_eq!(config.multicast_addr, Ipv4Addr::new(238, 0, 0, 18));
        assert_eq!(config.poll_delay, Duration::from_millis(100));
        assert!(!config.strict_correlation);
    }

    #[test]
    fn test_environment_overrides() {
        let config = HubConfig::from_lookup(lookup(&[
            ("BREL_HOST", "192.168.1.40"),
            ("BREL_KEY", "0123456789abcdef"),
            ("BREL_REQUEST_TIMEOUT_MS", "750"),
            ("BREL_STRICT_CORRELATION", "true"),
            ("BREL_SUBNET", ""),
        ]))
        .unwrap();
        assert_eq!(config.host, Some(Ipv4Addr::new(192, 168, 1, 40)));
        assert_eq!(config.shared_key.as_deref(), Some("0123456789abcdef"));
        assert_eq!(config.request_timeout, Duration::from_millis(750));
        assert!(config.strict_correlation);
        assert_eq!(config.subnet, None);
    }

    #[test]
    fn test_bad_value_is_config_error() {
        let result = HubConfig::from_lookup(lookup(&[("BREL_UNICAST_PORT", "ninety")]));
        assert!(matches!(result, Err(HubError::ConfigError(_))));
    }

    #[test]
    fn test_validate_requires_key_or_token() {
        let mut config = HubConfig::default();
        assert!(config.validate().is_err());
        config.access_token = Some("CAFEBABE".to_string());
        assert!(config.validate().is_ok());
    }
}
