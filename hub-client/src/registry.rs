use common::{DeviceEntry, DeviceRecord, HubError, Result, RoleUpdate, StatusFields};
use log::{debug, info, warn};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
struct Inner {
    devices: HashMap<String, DeviceRecord>,
    /// Controllable devices in hub order; never contains the hub.
    index: Vec<String>,
}

/// In-memory device table shared by the session and the report listener.
///
/// Cloning is cheap and every clone sees the same devices.
#[derive(Clone, Default)]
pub struct DeviceRegistry {
    inner: Arc<RwLock<Inner>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops all known devices and registers `entries` in hub order. The first
    /// entry is the hub itself and is kept out of the controllable index.
    pub fn replace_all(&self, entries: Vec<DeviceEntry>) -> Vec<DeviceRecord> {
        let mut devices = HashMap::with_capacity(entries.len());
        let mut index = Vec::with_capacity(entries.len().saturating_sub(1));
        let mut ordered = Vec::with_capacity(entries.len());

        for (position, entry) in entries.into_iter().enumerate() {
            if devices.contains_key(&entry.mac) {
                warn!("Ignoring repeated device {} in device list", entry.mac);
                continue;
            }
            let is_hub = position == 0;
            let record = DeviceRecord::from_entry(entry, is_hub);
            if !is_hub {
                index.push(record.mac.clone());
            }
            ordered.push(record.clone());
            devices.insert(record.mac.clone(), record);
        }

        let mut inner = self.inner.write();
        inner.devices = devices;
        inner.index = index;
        info!(
            "Registry rebuilt: {} devices ({} controllable)",
            inner.devices.len(),
            inner.index.len()
        );
        ordered
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.devices.clear();
        inner.index.clear();
    }

    pub fn get(&self, mac: &str) -> Option<DeviceRecord> {
        self.inner.read().devices.get(mac).cloned()
    }

    pub fn require(&self, mac: &str) -> Result<DeviceRecord> {
        self.get(mac).ok_or_else(|| HubError::UnknownDevice(mac.to_string()))
    }

    pub fn contains(&self, mac: &str) -> bool {
        self.inner.read().devices.contains_key(mac)
    }

    pub fn len(&self) -> usize {
        self.inner.read().devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().devices.is_empty()
    }

    pub fn hub(&self) -> Option<DeviceRecord> {
        self.inner.read().devices.values().find(|d| d.is_hub).cloned()
    }

    /// Macs of controllable devices, in hub order.
    pub fn controllable(&self) -> Vec<String> {
        self.inner.read().index.clone()
    }

    /// Snapshot of every device, hub first, then controllable devices in order.
    pub fn devices(&self) -> Vec<DeviceRecord> {
        let inner = self.inner.read();
        let hub = inner.devices.values().filter(|d| d.is_hub);
        let rest = inner.index.iter().filter_map(|mac| inner.devices.get(mac));
        hub.chain(rest).cloned().collect()
    }

    /// Maps a 1-based menu number to a device: 1 is the hub and cannot be
    /// selected, 2 is the first controllable device.
    pub fn mac_from_selection(&self, selection: &str) -> Result<String> {
        let number: usize = selection
            .trim()
            .parse()
            .map_err(|_| HubError::InvalidSelection(format!("'{}' is not a number", selection)))?;
        if number == 1 {
            return Err(HubError::InvalidSelection(
                "device 1 is the hub and cannot be controlled".to_string(),
            ));
        }
        let inner = self.inner.read();
        number
            .checked_sub(2)
            .and_then(|i| inner.index.get(i))
            .cloned()
            .ok_or_else(|| HubError::InvalidSelection(format!("no device number {}", number)))
    }

    /// Merges `fields` into the device's last status and returns the role
    /// values that were written.
    pub fn apply_status(&self, mac: &str, fields: &StatusFields) -> Result<Vec<RoleUpdate>> {
        let mut inner = self.inner.write();
        let record = inner
            .devices
            .get_mut(mac)
            .ok_or_else(|| HubError::UnknownDevice(mac.to_string()))?;
        let updates = record.apply_status(fields);
        debug!("Updated {}: {:?}", mac, updates);
        Ok(updates)
    }
}
