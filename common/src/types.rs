use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use chrono::{DateTime, Utc};
use std::fmt;

/// The hub's `deviceType`, echoed back verbatim in device-scoped requests.
///
/// Firmware in the field sends either a JSON number or a numeric string.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum DeviceType {
    Code(i64),
    Text(String),
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceType::Code(code) => write!(f, "{}", code),
            DeviceType::Text(text) => f.write_str(text),
        }
    }
}

/// One entry of the `GetDeviceList` reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceEntry {
    pub mac: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "deviceType")]
    pub device_type: DeviceType,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Status fields carried by `ReadDevice` replies and `Report` pushes.
/// Every field is optional; which ones appear depends on the device type.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StatusFields {
    #[serde(
        rename = "currentPosition",
        default,
        deserialize_with = "lenient_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub current_position: Option<i64>,
    #[serde(
        rename = "currentAngle",
        default,
        deserialize_with = "lenient_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub current_angle: Option<i64>,
    #[serde(
        rename = "batteryLevel",
        default,
        deserialize_with = "lenient_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub battery_level: Option<i64>,
    #[serde(
        rename = "chargingState",
        default,
        deserialize_with = "lenient_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub charging_state: Option<i64>,
    #[serde(
        rename = "RSSI",
        default,
        deserialize_with = "lenient_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub rssi: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Accepts integers, integral floats and numeric strings. Any other value
/// reads as absent so one odd field does not discard the rest of a status.
fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(as_i64(&Value::deserialize(deserializer)?))
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| s.parse::<f64>().ok().and_then(integral))
        }
        _ => None,
    }
}

fn integral(f: f64) -> Option<i64> {
    (f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64).then_some(f as i64)
}

impl StatusFields {
    pub fn get(&self, role: DeviceRole) -> Option<i64> {
        match role {
            DeviceRole::PositionSensor => self.current_position,
            DeviceRole::AngleSensor => self.current_angle,
            DeviceRole::BatterySensor => self.battery_level,
            DeviceRole::ChargingSensor => self.charging_state,
            DeviceRole::SignalSensor => self.rssi,
        }
    }

    pub fn set(&mut self, role: DeviceRole, value: i64) {
        let slot = match role {
            DeviceRole::PositionSensor => &mut self.current_position,
            DeviceRole::AngleSensor => &mut self.current_angle,
            DeviceRole::BatterySensor => &mut self.battery_level,
            DeviceRole::ChargingSensor => &mut self.charging_state,
            DeviceRole::SignalSensor => &mut self.rssi,
        };
        *slot = Some(value);
    }

    pub fn is_empty(&self) -> bool {
        DeviceRole::ALL.iter().all(|role| self.get(*role).is_none()) && self.extra.is_empty()
    }
}

/// What a registered device exposes to collaborators. Assigned once when the
/// device enters the registry; status updates are routed by role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DeviceRole {
    PositionSensor,
    AngleSensor,
    BatterySensor,
    ChargingSensor,
    SignalSensor,
}

impl DeviceRole {
    pub const ALL: [DeviceRole; 5] = [
        DeviceRole::PositionSensor,
        DeviceRole::AngleSensor,
        DeviceRole::BatterySensor,
        DeviceRole::ChargingSensor,
        DeviceRole::SignalSensor,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceRole::PositionSensor => "position",
            DeviceRole::AngleSensor => "angle",
            DeviceRole::BatterySensor => "battery",
            DeviceRole::ChargingSensor => "charging",
            DeviceRole::SignalSensor => "rssi",
        }
    }

    /// The hub itself has nothing to actuate or report.
    pub fn for_device(is_hub: bool) -> Vec<DeviceRole> {
        if is_hub {
            Vec::new()
        } else {
            DeviceRole::ALL.to_vec()
        }
    }
}

/// A role value that changed as the result of a read or a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleUpdate {
    pub role: DeviceRole,
    pub value: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub mac: String,
    pub name: Option<String>,
    pub device_type: DeviceType,
    pub is_hub: bool,
    pub roles: Vec<DeviceRole>,
    pub last_status: StatusFields,
    pub last_seen: Option<DateTime<Utc>>,
}

impl DeviceRecord {
    pub fn from_entry(entry: DeviceEntry, is_hub: bool) -> Self {
        Self {
            mac: entry.mac,
            name: entry.name,
            device_type: entry.device_type,
            is_hub,
            roles: DeviceRole::for_device(is_hub),
            last_status: StatusFields::default(),
            last_seen: None,
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().filter(|n| !n.is_empty()).unwrap_or(&self.mac)
    }

    /// Merges `fields` into `last_status` through the device's roles.
    /// Fields the report leaves out keep their previous value.
    pub fn apply_status(&mut self, fields: &StatusFields) -> Vec<RoleUpdate> {
        let mut updates = Vec::new();
        for role in &self.roles {
            if let Some(value) = fields.get(*role) {
                self.last_status.set(*role, value);
                updates.push(RoleUpdate { role: *role, value });
            }
        }
        for (key, value) in &fields.extra {
            self.last_status.extra.insert(key.clone(), value.clone());
        }
        self.last_seen = Some(Utc::now());
        updates
    }
}
