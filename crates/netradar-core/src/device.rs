//! Device types for tracking discovered network endpoints

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// Unique identifier for a device, derived from its hardware (MAC) address.
///
/// The MAC is the durable key: IP addresses may change between scans via
/// DHCP, but the hardware address identifies the same physical endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(pub String);

impl DeviceId {
    /// Create a DeviceId from a MAC address string.
    ///
    /// Normalizes to uppercase with separators stripped, so
    /// `aa:bb:cc:dd:ee:ff` and `AA-BB-CC-DD-EE-FF` map to the same id.
    pub fn from_mac(mac: &str) -> Self {
        let normalized: String = mac
            .chars()
            .filter(|c| c.is_ascii_hexdigit())
            .collect::<String>()
            .to_uppercase();
        Self(normalized)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Current presence status of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    /// Device answered the latest discovery sweep
    Online,
    /// Device was seen in a prior sweep but missed the latest one
    Offline,
    /// Device status has not been determined yet
    #[default]
    Unknown,
}

/// Inferred device category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Router,
    Computer,
    Mobile,
    Server,
    Iot,
    Printer,
    #[default]
    Unknown,
}

/// An open-port observation on a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    /// Port number (1-65535)
    pub number: u16,
    /// Transport protocol; only TCP connect-scanning is modeled
    pub protocol: String,
    /// Well-known service name, empty when unknown
    pub service: String,
    /// Always "open": closed/filtered ports are not reported
    pub state: String,
}

impl Port {
    pub fn open_tcp(number: u16, service: impl Into<String>) -> Self {
        Self {
            number,
            protocol: "tcp".to_string(),
            service: service.into(),
            state: "open".to_string(),
        }
    }
}

/// A discovered device on the local network
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    /// Stable identifier (normalized hardware address)
    pub id: DeviceId,
    /// Current IPv4 address (may change between scans)
    pub ip: Ipv4Addr,
    /// MAC address, uppercase colon-separated
    pub mac: String,
    /// Resolved hostname, first DNS label only
    pub hostname: Option<String>,
    /// Vendor name derived from the MAC OUI prefix
    pub vendor: Option<String>,
    /// Heuristic device classification
    pub device_type: DeviceType,
    /// Presence status
    pub status: DeviceStatus,
    /// When the device was first discovered, never overwritten
    pub first_seen: DateTime<Utc>,
    /// When the device last answered a discovery sweep
    pub last_seen: DateTime<Utc>,
    /// Open ports from the most recent probe, sorted by number
    pub ports: Vec<Port>,
    /// Round-trip discovery latency in milliseconds
    pub response_time_ms: Option<f64>,
}

impl Device {
    /// Create a new device from a discovery observation.
    ///
    /// The MAC is normalized to uppercase; `first_seen` and `last_seen`
    /// both start at now.
    pub fn new(ip: Ipv4Addr, mac: &str) -> Self {
        let now = Utc::now();
        Self {
            id: DeviceId::from_mac(mac),
            ip,
            mac: mac.to_uppercase(),
            hostname: None,
            vendor: None,
            device_type: DeviceType::Unknown,
            status: DeviceStatus::Unknown,
            first_seen: now,
            last_seen: now,
            ports: Vec::new(),
            response_time_ms: None,
        }
    }
}
