#![allow(dead_code)]

use common::HubConfig;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

pub const HUB_MAC: &str = "f0fe6b2ec38e";
pub const GATEWAY_TOKEN: &str = "A1B2C3D4E5F6G7H8";
pub const SHARED_KEY: &str = "0123456789abcdef";

pub fn blind(n: usize) -> String {
    format!("{}{:04}", HUB_MAC, n)
}

/// A scripted hub on loopback. It answers device list and read requests for
/// `blinds` devices, stays silent for any mac in `silent`, and forwards every
/// request it receives on the returned channel.
pub struct FakeHub {
    pub addr: SocketAddr,
    pub requests: mpsc::UnboundedReceiver<Value>,
}

impl FakeHub {
    pub async fn start(blinds: usize, silent: HashSet<String>) -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        let (tx, requests) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let mut buf = vec![0u8; 4096];
            loop {
                let (len, peer) = match socket.recv_from(&mut buf).await {
                    Ok(received) => received,
                    Err(_) => break,
                };
                let request: Value = match serde_json::from_slice(&buf[..len]) {
                    Ok(v) => v,
                    Err(_) => continue,
                };
                let _ = tx.send(request.clone());

                if let Some(reply) = answer(&request, blinds, &silent) {
                    let _ = socket.send_to(reply.to_string().as_bytes(), peer).await;
                }
            }
        });

        Self { addr, requests }
    }

    /// A config pointing at this hub with short timeouts.
    pub fn config(&self) -> HubConfig {
        HubConfig {
            host: Some("127.0.0.1".parse().unwrap()),
            unicast_port: self.addr.port(),
            request_timeout: Duration::from_millis(300),
            scan_timeout: Duration::from_millis(300),
            poll_delay: Duration::from_millis(10),
            ..Default::default()
        }
    }

    /// Next request of the given type, skipping others.
    pub async fn next_request(&mut self, msg_type: &str) -> Value {
        loop {
            let request = tokio::time::timeout(Duration::from_secs(2), self.requests.recv())
                .await
                .expect("fake hub saw no request")
                .expect("fake hub stopped");
            if request["msgType"] == msg_type {
                return request;
            }
        }
    }
}

fn answer(request: &Value, blinds: usize, silent: &HashSet<String>) -> Option<Value> {
    let msg_id = request["msgID"].clone();
    match request["msgType"].as_str()? {
        "GetDeviceList" => {
            let mut data = vec![json!({"mac": HUB_MAC, "deviceType": "02000001"})];
            for n in 1..=blinds {
                data.push(json!({"mac": blind(n), "deviceType": "10000000"}));
            }
            Some(json!({
                "msgType": "GetDeviceListAck",
                "msgID": msg_id,
                "token": GATEWAY_TOKEN,
                "data": data,
            }))
        }
        "ReadDevice" => {
            let mac = request["mac"].as_str()?;
            if silent.contains(mac) {
                return None;
            }
            Some(json!({
                "msgType": "ReadDeviceAck",
                "mac": mac,
                "deviceType": request["deviceType"],
                "msgID": msg_id,
                "data": {"currentPosition": 42, "currentAngle": 90, "RSSI": -55},
            }))
        }
        "WriteDevice" => Some(json!({
            "msgType": "WriteDeviceAck",
            "mac": request["mac"],
            "deviceType": request["deviceType"],
            "msgID": msg_id,
            "data": request["data"],
        })),
        _ => None,
    }
}
