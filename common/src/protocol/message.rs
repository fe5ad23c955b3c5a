use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use crate::error::{HubError, Result};
use crate::protocol::correlation::correlation_id;
use crate::types::{DeviceEntry, DeviceType, StatusFields};

/// The `msgType` field. Unknown types are kept as-is rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MsgType {
    GetDeviceList,
    GetDeviceListAck,
    ReadDevice,
    ReadDeviceAck,
    WriteDevice,
    WriteDeviceAck,
    Report,
    Heartbeat,
    Gateway,
    Other(String),
}

impl MsgType {
    pub fn as_str(&self) -> &str {
        match self {
            MsgType::GetDeviceList => "GetDeviceList",
            MsgType::GetDeviceListAck => "GetDeviceListAck",
            MsgType::ReadDevice => "ReadDevice",
            MsgType::ReadDeviceAck => "ReadDeviceAck",
            MsgType::WriteDevice => "WriteDevice",
            MsgType::WriteDeviceAck => "WriteDeviceAck",
            MsgType::Report => "Report",
            MsgType::Heartbeat => "Heartbeat",
            MsgType::Gateway => "Gateway",
            MsgType::Other(other) => other,
        }
    }
}

impl From<String> for MsgType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "GetDeviceList" => MsgType::GetDeviceList,
            "GetDeviceListAck" => MsgType::GetDeviceListAck,
            "ReadDevice" => MsgType::ReadDevice,
            "ReadDeviceAck" => MsgType::ReadDeviceAck,
            "WriteDevice" => MsgType::WriteDevice,
            "WriteDeviceAck" => MsgType::WriteDeviceAck,
            "Report" => MsgType::Report,
            "Heartbeat" => MsgType::Heartbeat,
            "Gateway" => MsgType::Gateway,
            _ => MsgType::Other(value),
        }
    }
}

impl From<MsgType> for String {
    fn from(value: MsgType) -> Self {
        match value {
            MsgType::Other(other) => other,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for MsgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of a `WriteDevice` request. Only supplied targets go on the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WriteCommand {
    #[serde(rename = "targetPosition", default, skip_serializing_if = "Option::is_none")]
    pub target_position: Option<u8>,
    #[serde(rename = "targetAngle", default, skip_serializing_if = "Option::is_none")]
    pub target_angle: Option<u8>,
}

impl WriteCommand {
    pub const MAX_POSITION: u8 = 100;
    pub const MAX_ANGLE: u8 = 180;

    pub fn new(position: Option<u8>, angle: Option<u8>) -> Result<Self> {
        if position.is_none() && angle.is_none() {
            return Err(HubError::InvalidCommand(
                "at least one of position or angle is required".to_string(),
            ));
        }
        if let Some(p) = position.filter(|p| *p > Self::MAX_POSITION) {
            return Err(HubError::InvalidCommand(format!(
                "position {} out of range 0-{}", p, Self::MAX_POSITION
            )));
        }
        if let Some(a) = angle.filter(|a| *a > Self::MAX_ANGLE) {
            return Err(HubError::InvalidCommand(format!(
                "angle {} out of range 0-{}", a, Self::MAX_ANGLE
            )));
        }
        Ok(Self { target_position: position, target_angle: angle })
    }
}

/// The JSON envelope exchanged with the hub, in both directions.
///
/// Replies do not always carry every field (a device list reply may omit
/// `msgType`), so everything is optional and unknown keys land in `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Message {
    #[serde(rename = "msgType", default, skip_serializing_if = "Option::is_none")]
    pub msg_type: Option<MsgType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
    #[serde(rename = "deviceType", default, skip_serializing_if = "Option::is_none")]
    pub device_type: Option<DeviceType>,
    #[serde(rename = "AccessToken", default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(rename = "msgID", default, skip_serializing_if = "Option::is_none")]
    pub msg_id: Option<String>,
    /// Gateway token, present on device list replies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Message {
    pub fn get_device_list() -> Self {
        Self {
            msg_type: Some(MsgType::GetDeviceList),
            msg_id: Some(correlation_id(None)),
            ..Default::default()
        }
    }

    pub fn read_device(mac: &str, device_type: &DeviceType) -> Self {
        Self {
            msg_type: Some(MsgType::ReadDevice),
            mac: Some(mac.to_string()),
            device_type: Some(device_type.clone()),
            msg_id: Some(correlation_id(Some(mac))),
            ..Default::default()
        }
    }

    pub fn write_device(
        mac: &str,
        device_type: &DeviceType,
        access_token: &str,
        command: &WriteCommand,
    ) -> Result<Self> {
        Ok(Self {
            msg_type: Some(MsgType::WriteDevice),
            mac: Some(mac.to_string()),
            device_type: Some(device_type.clone()),
            access_token: Some(access_token.to_string()),
            data: Some(serde_json::to_value(command)?),
            msg_id: Some(correlation_id(Some(mac))),
            ..Default::default()
        })
    }

    pub fn is(&self, msg_type: &MsgType) -> bool {
        self.msg_type.as_ref() == Some(msg_type)
    }

    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }

    /// The device array of a `GetDeviceList` reply, in hub order.
    pub fn device_entries(&self) -> Result<Vec<DeviceEntry>> {
        match &self.data {
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    serde_json::from_value(item.clone()).map_err(|e| {
                        HubError::MalformedResponse(format!("bad device entry {}: {}", item, e))
                    })
                })
                .collect(),
            Some(other) => Err(HubError::MalformedResponse(format!(
                "expected device array, got {}", other
            ))),
            None => Err(HubError::MalformedResponse("device list reply has no data".to_string())),
        }
    }

    /// The status object of a `ReadDevice` reply or a `Report`.
    pub fn status_fields(&self) -> Result<StatusFields> {
        match &self.data {
            Some(data @ Value::Object(_)) => Ok(serde_json::from_value(data.clone())?),
            Some(other) => Err(HubError::MalformedResponse(format!(
                "expected status object, got {}", other
            ))),
            None => Err(HubError::MalformedResponse("status reply has no data".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_device_list_shape() {
        let msg = Message::get_device_list();
        let value = serde_json::to_value(&msg).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 2);
        assert_eq!(obj["msgType"], json!("GetDeviceList"));
        assert!(obj["msgID"].as_str().unwrap().starts_with("101"));
    }

    #[test]
    fn test_read_device_shape() {
        let msg = Message::read_device("AABB11223344", &DeviceType::Code(10000000));
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["msgType"], json!("ReadDevice"));
        assert_eq!(value["mac"], json!("AABB11223344"));
        assert_eq!(value["deviceType"], json!(10000000));
        assert!(value.get("AccessToken").is_none());
        assert!(value.get("data").is_none());
        assert!(value["msgID"].as_str().unwrap().starts_with("11223344"));
    }

    #[test]
    fn test_write_device_carries_only_supplied_fields() {
        let command = WriteCommand::new(Some(30), None).unwrap();
        let msg = Message::write_device(
            "AABB11223344",
            &DeviceType::Text("10000000".to_string()),
            "CAFEBABE",
            &command,
        )
        .unwrap();
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["AccessToken"], json!("CAFEBABE"));
        assert_eq!(value["deviceType"], json!("10000000"));
        assert_eq!(value["data"], json!({"targetPosition": 30}));
    }

    #[test]
    fn test_write_command_rejects_empty_and_out_of_range() {
        assert!(matches!(WriteCommand::new(None, None), Err(HubError::InvalidCommand(_))));
        assert!(matches!(WriteCommand::new(Some(101), None), Err(HubError::InvalidCommand(_))));
        assert!(matches!(WriteCommand::new(None, Some(181)), Err(HubError::InvalidCommand(_))));
        assert!(WriteCommand::new(Some(100), Some(180)).is_ok());
    }

    #[test]
    fn test_unknown_msg_type_is_preserved() {
        let msg: Message = serde_json::from_value(json!({"msgType": "Firmware"})).unwrap();
        assert_eq!(msg.msg_type, Some(MsgType::Other("Firmware".to_string())));
        assert_eq!(serde_json::to_value(&msg).unwrap()["msgType"], json!("Firmware"));
    }

    #[test]
    fn test_device_entries_in_hub_order() {
        let msg: Message = serde_json::from_value(json!({
            "msgType": "GetDeviceListAck",
            "data": [
                {"mac": "f0fe6b2ec38e", "deviceType": "02000001"},
                {"mac": "f0fe6b2ec38e0001", "deviceType": "10000000", "name": "Living"}
            ],
            "token": "0123456789ABCDEF"
        }))
        .unwrap();
        let entries = msg.device_entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].mac, "f0fe6b2ec38e");
        assert_eq!(entries[1].name.as_deref(), Some("Living"));
        assert_eq!(msg.token.as_deref(), Some("0123456789ABCDEF"));
    }

    #[test]
    fn test_status_fields_requires_object() {
        let msg: Message = serde_json::from_value(json!({"data": [1, 2]})).unwrap();
        assert!(matches!(msg.status_fields(), Err(HubError::MalformedResponse(_))));
        let empty = Message::default();
        assert!(matches!(empty.status_fields(), Err(HubError::MalformedResponse(_))));
    }
}
