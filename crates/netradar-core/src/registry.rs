//! In-memory device registry keyed by hardware address
//!
//! The registry is not internally synchronized: the discovery orchestrator
//! is the single writer during a scan cycle and wraps it in a lock.

use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;
use tracing::debug;

use crate::device::{Device, DeviceId, DeviceStatus};

/// Authoritative set of known devices within the process lifetime.
///
/// Devices persist across scans and are never removed: a device absent from
/// the latest sweep stays queryable as offline rather than vanishing.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: HashMap<DeviceId, Device>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or refresh a device observation.
    ///
    /// When the device is already registered its original `first_seen` is
    /// preserved; every other field is overwritten by the new observation.
    /// Returns the record as stored.
    pub fn upsert(&mut self, mut device: Device) -> Device {
        if let Some(existing) = self.devices.get(&device.id) {
            device.first_seen = existing.first_seen;
        } else {
            debug!(id = %device.id, ip = %device.ip, "Registering new device");
        }
        self.devices.insert(device.id.clone(), device.clone());
        device
    }

    /// Mark every registered device not in `seen` as offline.
    ///
    /// Returns the devices that actually transitioned; devices already
    /// offline are left untouched, so repeated calls with the same `seen`
    /// set are idempotent.
    pub fn mark_absent(&mut self, seen: &HashSet<DeviceId>) -> Vec<Device> {
        let mut transitioned = Vec::new();
        for (id, device) in self.devices.iter_mut() {
            if !seen.contains(id) && device.status == DeviceStatus::Online {
                device.status = DeviceStatus::Offline;
                transitioned.push(device.clone());
            }
        }
        transitioned
    }

    pub fn get(&self, id: &DeviceId) -> Option<&Device> {
        self.devices.get(id)
    }

    /// Find a device by its current IP. Linear scan: the IP is not the
    /// primary key and uniqueness across time is not guaranteed.
    pub fn get_by_ip(&self, ip: Ipv4Addr) -> Option<&Device> {
        self.devices.values().find(|d| d.ip == ip)
    }

    pub fn all(&self) -> Vec<Device> {
        self.devices.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
