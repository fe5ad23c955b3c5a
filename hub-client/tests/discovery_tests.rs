mod support;

use common::HubError;
use hub_client::discovery::sweep_subnet;
use hub_client::{Discovery, DiscoveryStrategy, HubSession, UdpTransport};
use std::collections::HashSet;
use std::net::Ipv4Addr;
use support::FakeHub;
use tokio::net::UdpSocket;

#[tokio::test]
async fn test_direct_strategy_finds_fake_hub() {
    let hub = FakeHub::start(1, HashSet::new()).await;
    let found = Discovery::new(hub.config())
        .with_strategies(vec![DiscoveryStrategy::Direct])
        .discover()
        .await
        .unwrap();
    assert_eq!(found.addr, Ipv4Addr::LOCALHOST);
    assert_eq!(found.via, DiscoveryStrategy::Direct);
}

#[tokio::test]
async fn test_silent_host_is_not_found() {
    let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let hub = FakeHub::start(0, HashSet::new()).await;
    let mut config = hub.config();
    config.unicast_port = silent.local_addr().unwrap().port();

    let err = Discovery::new(config)
        .with_strategies(vec![DiscoveryStrategy::Direct])
        .discover()
        .await
        .unwrap_err();
    assert!(matches!(err, HubError::NotFound));
}

#[tokio::test]
async fn test_no_strategy_configured_is_not_found() {
    let hub = FakeHub::start(0, HashSet::new()).await;
    let mut config = hub.config();
    config.host = None;
    config.subnet = None;

    let err = Discovery::new(config)
        .with_strategies(vec![DiscoveryStrategy::Direct, DiscoveryStrategy::Sweep])
        .discover()
        .await
        .unwrap_err();
    assert!(matches!(err, HubError::NotFound));
}

#[tokio::test]
async fn test_session_connects_through_discovery() {
    let hub = FakeHub::start(2, HashSet::new()).await;
    let mut config = hub.config();
    config.access_token = Some("CAFEBABE".to_string());

    // Direct succeeds first, so broadcast and multicast never run.
    let mut session = HubSession::connect(config).await.unwrap();
    assert_eq!(session.host(), Ipv4Addr::LOCALHOST);
    assert_eq!(session.list_devices().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_sweep_finds_hub_in_subnet() {
    let hub = FakeHub::start(1, HashSet::new()).await;
    let mut config = hub.config();
    config.host = None;
    let transport = UdpTransport::new(&config);

    let found = sweep_subnet(&transport, &config, Ipv4Addr::new(127, 0, 0, 9), None).await;
    assert_eq!(found, Some(Ipv4Addr::LOCALHOST));
}

#[tokio::test]
async fn test_sweep_strategy_reports_via_sweep() {
    let hub = FakeHub::start(1, HashSet::new()).await;
    let mut config = hub.config();
    config.host = None;
    config.subnet = Some(Ipv4Addr::new(127, 0, 0, 200));

    let found = Discovery::new(config)
        .with_strategies(vec![DiscoveryStrategy::Sweep])
        .discover()
        .await
        .unwrap();
    assert_eq!(found.addr, Ipv4Addr::LOCALHOST);
    assert_eq!(found.via, DiscoveryStrategy::Sweep);
}

#[tokio::test]
async fn test_connect_falls_back_to_configured_host() {
    let hub = FakeHub::start(2, HashSet::new()).await;
    let mut config = hub.config();
    config.access_token = Some("CAFEBABE".to_string());

    // Nothing to sweep, so discovery comes up empty.
    let mut failing = config.clone();
    failing.subnet = None;
    let discovery = Discovery::new(failing).with_strategies(vec![DiscoveryStrategy::Sweep]);

    let mut session = HubSession::connect_with(config, &discovery).await.unwrap();
    assert_eq!(session.host(), Ipv4Addr::LOCALHOST);
    assert_eq!(session.list_devices().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_connect_without_fallback_is_not_found() {
    let hub = FakeHub::start(0, HashSet::new()).await;
    let mut config = hub.config();
    config.host = None;
    config.subnet = None;
    let discovery = Discovery::new(config.clone()).with_strategies(vec![DiscoveryStrategy::Sweep]);

    let err = HubSession::connect_with(config, &discovery).await.err().unwrap();
    assert!(matches!(err, HubError::NotFound));
}
