//! Discovery orchestrator: drives one scan cycle and reconciles results
//! into the device registry
//!
//! The scanner owns the registry and the scan-session state. Network I/O
//! fans out on workers, but every registry write happens on the single
//! orchestrating task, so the registry itself needs no internal locking
//! discipline beyond the lock the scanner wraps it in.

use anyhow::Result;
use chrono::{DateTime, Utc};
use netradar_core::{classify, Device, DeviceId, DeviceRegistry, DeviceStatus, DeviceType};
use pnet::ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{debug, info, warn};

use crate::net;
use crate::probe;
use crate::resolve;
use crate::sweep::{self, DiscoveredHost};

/// Scanner configuration
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Subnet to scan; autodetected from the local interface when None
    pub subnet: Option<Ipv4Network>,
    /// Reply-collection window for the ARP sweep
    pub arp_timeout: Duration,
    /// Per-port TCP handshake timeout
    pub port_timeout: Duration,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            subnet: None,
            arp_timeout: Duration::from_secs(3),
            port_timeout: probe::DEFAULT_PORT_TIMEOUT,
        }
    }
}

/// Request-level scan failures, reported synchronously to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ScanError {
    /// A scan request arrived while another scan was running
    #[error("scan already in progress")]
    ScanInProgress,
    /// No registered device matched the requested IP
    #[error("device not found")]
    DeviceNotFound,
}

/// Lifecycle event emitted over the broadcast channel, one variant per
/// wire event name
#[derive(Debug, Clone)]
pub enum ScanEvent {
    ScanStarted,
    DeviceFound(Device),
    DeviceUpdated(Device),
    ScanCompleted(ScanResult),
    ScanError { message: String },
}

/// Snapshot emitted when a scan cycle completes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub timestamp: DateTime<Utc>,
    pub network_cidr: String,
    pub gateway_ip: Ipv4Addr,
    pub devices: Vec<Device>,
    pub scan_duration_ms: f64,
}

/// Scan progress as exposed to API clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanStatus {
    pub is_scanning: bool,
    pub progress: u8,
    pub devices_found: usize,
}

/// Atomic scan-session state. At most one session may be active
/// process-wide; acquisition is a compare-exchange on the scanning flag.
#[derive(Debug, Default)]
struct ScanGate {
    scanning: AtomicBool,
    progress: AtomicU8,
    devices_found: AtomicUsize,
}

impl ScanGate {
    /// Begin a scan session. Fails without side effects when a session is
    /// already active.
    fn try_acquire(self: &Arc<Self>) -> Option<SessionGuard> {
        if self
            .scanning
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }
        self.progress.store(0, Ordering::Release);
        self.devices_found.store(0, Ordering::Release);
        Some(SessionGuard { gate: self.clone() })
    }

    fn add_found(&self) {
        self.devices_found.fetch_add(1, Ordering::AcqRel);
    }

    fn snapshot(&self) -> ScanStatus {
        ScanStatus {
            is_scanning: self.scanning.load(Ordering::Acquire),
            progress: self.progress.load(Ordering::Acquire),
            devices_found: self.devices_found.load(Ordering::Acquire),
        }
    }
}

/// RAII handle for an active scan session. Dropping it releases the gate,
/// so the idle-state cleanup runs on success, failure, and panic alike.
struct SessionGuard {
    gate: Arc<ScanGate>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.gate.progress.store(100, Ordering::Release);
        self.gate.scanning.store(false, Ordering::Release);
    }
}

/// Discovery orchestrator and device registry owner
pub struct NetworkScanner {
    config: ScannerConfig,
    registry: Arc<RwLock<DeviceRegistry>>,
    gate: Arc<ScanGate>,
    event_tx: broadcast::Sender<ScanEvent>,
}

impl NetworkScanner {
    pub fn new(config: ScannerConfig) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            config,
            registry: Arc::new(RwLock::new(DeviceRegistry::new())),
            gate: Arc::new(ScanGate::default()),
            event_tx,
        }
    }

    /// Subscribe to scan lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.event_tx.subscribe()
    }

    /// Current scan progress
    pub fn scan_status(&self) -> ScanStatus {
        self.gate.snapshot()
    }

    /// All known devices, online and offline
    pub async fn devices(&self) -> Vec<Device> {
        self.registry.read().await.all()
    }

    /// Look up a device by its current IP
    pub async fn get_by_ip(&self, ip: Ipv4Addr) -> Option<Device> {
        self.registry.read().await.get_by_ip(ip).cloned()
    }

    /// The subnet and gateway a scan would run against right now
    pub fn network_info(&self) -> Result<(Ipv4Network, Ipv4Addr)> {
        match self.config.subnet {
            Some(network) => Ok((network, net::first_host(&network))),
            None => {
                let interface = net::usable_interface()?;
                net::local_network(&interface)
            }
        }
    }

    /// Start a full discovery scan in the background.
    ///
    /// Rejects with `ScanInProgress` when a scan is already running; no
    /// second session is created.
    pub fn start_scan(self: &Arc<Self>) -> Result<(), ScanError> {
        let session = self.gate.try_acquire().ok_or(ScanError::ScanInProgress)?;
        let scanner = self.clone();
        tokio::spawn(async move {
            scanner.run_scan(session).await;
        });
        Ok(())
    }

    /// On-demand deep probe of one device's ports with the full profile.
    ///
    /// Bypasses the scan session entirely and may run alongside a sweep.
    pub async fn rescan_ports(&self, ip: Ipv4Addr) -> Result<Device, ScanError> {
        let mut device = self
            .registry
            .read()
            .await
            .get_by_ip(ip)
            .cloned()
            .ok_or(ScanError::DeviceNotFound)?;

        info!(ip = %ip, "Deep port scan requested");

        let ports = probe::probe(ip, probe::FULL_PROFILE, self.config.port_timeout).await;
        let open: Vec<u16> = ports.iter().map(|p| p.number).collect();

        device.ports = ports;
        device.device_type = classify(
            device.vendor.as_deref(),
            device.hostname.as_deref(),
            &open,
        );

        let stored = self.registry.write().await.upsert(device);
        let _ = self.event_tx.send(ScanEvent::DeviceUpdated(stored.clone()));
        Ok(stored)
    }

    /// One complete scan cycle. The session guard keeps the gate held for
    /// the duration and releases it on every exit path.
    async fn run_scan(self: Arc<Self>, _session: SessionGuard) {
        let _ = self.event_tx.send(ScanEvent::ScanStarted);

        let started = Instant::now();
        let timestamp = Utc::now();

        match self.scan_cycle().await {
            Ok((network, gateway)) => {
                let devices = self.registry.read().await.all();
                let elapsed = started.elapsed().as_secs_f64() * 1000.0;
                let result = ScanResult {
                    timestamp,
                    network_cidr: network.to_string(),
                    gateway_ip: gateway,
                    devices,
                    scan_duration_ms: (elapsed * 100.0).round() / 100.0,
                };
                info!(
                    found = result.devices.len(),
                    duration_ms = result.scan_duration_ms,
                    "Scan completed"
                );
                let _ = self.event_tx.send(ScanEvent::ScanCompleted(result));
            }
            Err(e) => {
                warn!(error = %e, "Discovery scan failed");
                let _ = self.event_tx.send(ScanEvent::ScanError {
                    message: e.to_string(),
                });
            }
        }
    }

    /// Sweep the subnet and fold each discovered host into the registry as
    /// it arrives, then reconcile devices that went missing.
    async fn scan_cycle(&self) -> Result<(Ipv4Network, Ipv4Addr)> {
        let interface = net::usable_interface()?;
        let (network, gateway) = match self.config.subnet {
            Some(network) => (network, net::first_host(&network)),
            None => net::local_network(&interface)?,
        };

        info!(
            interface = %interface.name,
            network = %network,
            gateway = %gateway,
            "Starting discovery scan"
        );

        let (found_tx, mut found_rx) = mpsc::unbounded_channel::<DiscoveredHost>();
        let arp_timeout = self.config.arp_timeout;
        let sweep_task =
            tokio::spawn(sweep::discover(interface, network, arp_timeout, found_tx));

        // Hosts are processed in ARP reply order; the port probe inside
        // each enrichment fans out, but results fold back here one at a
        // time, keeping the registry single-writer.
        let mut seen: HashSet<DeviceId> = HashSet::new();
        while let Some(host) = found_rx.recv().await {
            let device = self.enrich(host, gateway).await;
            debug!(
                ip = %device.ip,
                mac = %device.mac,
                kind = ?device.device_type,
                "Device found"
            );
            seen.insert(device.id.clone());

            let stored = self.registry.write().await.upsert(device);
            self.gate.add_found();
            let _ = self.event_tx.send(ScanEvent::DeviceFound(stored));
        }

        // Channel closed: the sweep finished or died. A sweep-level error
        // aborts the cycle here.
        sweep_task.await.map_err(anyhow::Error::from)??;

        let transitioned = self.registry.write().await.mark_absent(&seen);
        for device in transitioned {
            debug!(ip = %device.ip, mac = %device.mac, "Device went offline");
            let _ = self.event_tx.send(ScanEvent::DeviceUpdated(device));
        }

        Ok((network, gateway))
    }

    /// Build a full device record for one sweep observation
    async fn enrich(&self, host: DiscoveredHost, gateway: Ipv4Addr) -> Device {
        let mac = host.mac.to_string().to_uppercase();

        let ports = probe::probe(host.ip, probe::QUICK_PROFILE, self.config.port_timeout).await;
        let hostname = resolve::resolve_hostname(host.ip).await;
        let vendor = resolve::lookup_vendor(&mac);

        let open: Vec<u16> = ports.iter().map(|p| p.number).collect();
        let device_type = effective_type(
            vendor.as_deref(),
            hostname.as_deref(),
            &open,
            host.ip,
            gateway,
        );

        let mut device = Device::new(host.ip, &mac);
        device.hostname = hostname;
        device.vendor = vendor;
        device.device_type = device_type;
        device.status = DeviceStatus::Online;
        device.ports = ports;
        device.response_time_ms = Some(host.response_time_ms);
        device
    }
}

/// Classification with the gateway override: the host at the gateway
/// address is the router no matter what the classifier says.
fn effective_type(
    vendor: Option<&str>,
    hostname: Option<&str>,
    open_ports: &[u16],
    ip: Ipv4Addr,
    gateway: Ipv4Addr,
) -> DeviceType {
    if ip == gateway {
        return DeviceType::Router;
    }
    classify(vendor, hostname, open_ports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use netradar_core::Port;

    #[test]
    fn test_gate_rejects_second_session() {
        let gate = Arc::new(ScanGate::default());

        let first = gate.try_acquire();
        assert!(first.is_some());
        assert!(gate.snapshot().is_scanning);

        // Second acquisition must fail while the first is held
        assert!(gate.try_acquire().is_none());

        drop(first);
        assert!(!gate.snapshot().is_scanning);
        assert_eq!(gate.snapshot().progress, 100);

        // Gate is reusable after release
        assert!(gate.try_acquire().is_some());
    }

    #[test]
    fn test_gate_resets_counters_on_acquire() {
        let gate = Arc::new(ScanGate::default());

        let session = gate.try_acquire().unwrap();
        gate.add_found();
        gate.add_found();
        assert_eq!(gate.snapshot().devices_found, 2);
        drop(session);

        let _session = gate.try_acquire().unwrap();
        let status = gate.snapshot();
        assert!(status.is_scanning);
        assert_eq!(status.progress, 0);
        assert_eq!(status.devices_found, 0);
    }

    #[test]
    fn test_gateway_override_forces_router() {
        let gateway = Ipv4Addr::new(192, 168, 1, 1);
        // No vendor, no ports: the classifier alone would say Unknown
        assert_eq!(
            effective_type(None, None, &[], gateway, gateway),
            DeviceType::Router
        );
        assert_eq!(
            effective_type(None, None, &[], Ipv4Addr::new(192, 168, 1, 2), gateway),
            DeviceType::Unknown
        );
    }

    #[tokio::test]
    async fn test_start_scan_conflict() {
        let scanner = Arc::new(NetworkScanner::new(ScannerConfig::default()));

        // Hold the gate directly to simulate a running scan
        let _session = scanner.gate.try_acquire().unwrap();
        assert_eq!(scanner.start_scan(), Err(ScanError::ScanInProgress));
        assert!(scanner.scan_status().is_scanning);
    }

    #[tokio::test]
    async fn test_rescan_ports_unknown_ip() {
        let scanner = NetworkScanner::new(ScannerConfig::default());
        let result = scanner.rescan_ports(Ipv4Addr::new(192, 168, 1, 99)).await;
        assert_eq!(result.unwrap_err(), ScanError::DeviceNotFound);
    }

    #[tokio::test]
    async fn test_rescan_ports_updates_device_and_emits_event() {
        let config = ScannerConfig {
            // TEST-NET target, every handshake times out quickly
            port_timeout: Duration::from_millis(100),
            ..Default::default()
        };
        let scanner = NetworkScanner::new(config);
        let mut rx = scanner.subscribe();

        let ip = Ipv4Addr::new(192, 0, 2, 10);
        let mut device = Device::new(ip, "aa:bb:cc:dd:ee:ff");
        device.status = DeviceStatus::Online;
        device.ports = vec![Port::open_tcp(80, "HTTP")];
        let first_seen = device.first_seen;
        scanner.registry.write().await.upsert(device);

        let rescanned = scanner.rescan_ports(ip).await.unwrap();
        assert!(rescanned.ports.is_empty());
        assert_eq!(rescanned.first_seen, first_seen);

        match rx.try_recv() {
            Ok(ScanEvent::DeviceUpdated(d)) => assert_eq!(d.ip, ip),
            other => panic!("expected DeviceUpdated, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_offline_device_retained_and_queryable() {
        let scanner = NetworkScanner::new(ScannerConfig::default());

        let mut device = Device::new(Ipv4Addr::new(192, 168, 1, 42), "aa:bb:cc:dd:ee:ff");
        device.status = DeviceStatus::Online;
        let id = device.id.clone();
        scanner.registry.write().await.upsert(device);

        // Next cycle does not see the device
        let transitioned = scanner.registry.write().await.mark_absent(&HashSet::new());
        assert_eq!(transitioned.len(), 1);

        let all = scanner.devices().await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, id);
        assert_eq!(all[0].status, DeviceStatus::Offline);
    }
}
