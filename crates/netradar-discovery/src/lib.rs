//! Netradar Discovery - LAN host discovery and classification engine
//!
//! This crate drives one full discovery cycle:
//! - ICMP ping warm-up and broadcast ARP sweep for host discovery
//! - TCP connect-scanning of well-known ports per host
//! - Vendor / hostname enrichment and device-type classification
//! - Reconciliation into the device registry with lifecycle events

pub mod net;
pub mod probe;
pub mod resolve;
pub mod scanner;
pub mod sweep;

pub use scanner::{
    NetworkScanner, ScanError, ScanEvent, ScanResult, ScanStatus, ScannerConfig,
};
pub use sweep::DiscoveredHost;
