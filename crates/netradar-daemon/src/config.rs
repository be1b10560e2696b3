//! Configuration loading and validation

use anyhow::{Context, Result};
use netradar_discovery::ScannerConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub scan: ScanConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Bind address for the web server
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Subnet to scan in CIDR form; autodetected when omitted
    #[serde(default)]
    pub subnet: Option<String>,
    /// ARP reply-collection window in seconds
    #[serde(default = "default_arp_timeout")]
    pub arp_timeout_secs: f64,
    /// Per-port TCP handshake timeout in milliseconds
    #[serde(default = "default_port_timeout")]
    pub port_timeout_ms: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            subnet: None,
            arp_timeout_secs: default_arp_timeout(),
            port_timeout_ms: default_port_timeout(),
        }
    }
}

fn default_arp_timeout() -> f64 {
    3.0
}

fn default_port_timeout() -> u64 {
    1000
}

impl Config {
    /// Convert to the discovery crate's scanner configuration
    pub fn to_scanner_config(&self) -> Result<ScannerConfig> {
        let subnet = match &self.scan.subnet {
            Some(cidr) => Some(
                cidr.parse()
                    .with_context(|| format!("invalid scan subnet {cidr:?}"))?,
            ),
            None => None,
        };

        Ok(ScannerConfig {
            subnet,
            arp_timeout: Duration::from_secs_f64(self.scan.arp_timeout_secs),
            port_timeout: Duration::from_millis(self.scan.port_timeout_ms),
        })
    }
}

/// Load configuration from file, falling back to defaults when absent
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.daemon.bind, "0.0.0.0:8000");
        assert!(config.scan.subnet.is_none());

        let scanner = config.to_scanner_config().unwrap();
        assert_eq!(scanner.arp_timeout, Duration::from_secs(3));
        assert_eq!(scanner.port_timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [scan]
            subnet = "10.1.0.0/24"
            arp_timeout_secs = 5.0
            "#,
        )
        .unwrap();

        assert_eq!(config.daemon.bind, "0.0.0.0:8000");
        let scanner = config.to_scanner_config().unwrap();
        assert_eq!(scanner.arp_timeout, Duration::from_secs(5));
        assert_eq!(scanner.subnet.unwrap().to_string(), "10.1.0.0/24");
    }

    #[test]
    fn test_invalid_subnet_rejected() {
        let config: Config = toml::from_str(
            r#"
            [scan]
            subnet = "not-a-subnet"
            "#,
        )
        .unwrap();
        assert!(config.to_scanner_config().is_err());
    }
}
