//! Application state management

use anyhow::Result;
use netradar_core::Device;
use netradar_discovery::{NetworkScanner, ScanEvent};
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::config::Config;

/// Shared application state
pub struct AppState {
    /// Discovery orchestrator and device registry owner
    pub scanner: Arc<NetworkScanner>,
    /// Configuration
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config) -> Result<Arc<Self>> {
        let scanner_config = config.to_scanner_config()?;
        let scanner = Arc::new(NetworkScanner::new(scanner_config));
        Ok(Arc::new(Self { scanner, config }))
    }

    pub async fn devices(&self) -> Vec<Device> {
        self.scanner.devices().await
    }

    pub async fn get_device(&self, ip: Ipv4Addr) -> Option<Device> {
        self.scanner.get_by_ip(ip).await
    }

    /// Subscribe to scan lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.scanner.subscribe()
    }
}
