//! Per-host enrichment: OUI vendor lookup and reverse DNS

use dns_lookup::lookup_addr;
use mac_oui::Oui;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::OnceLock;
use tracing::warn;

/// Lazily loaded OUI database. Load failure is logged once and treated as
/// "no vendor data", never as an error to the caller.
fn oui_db() -> Option<&'static Oui> {
    static DB: OnceLock<Option<Oui>> = OnceLock::new();
    DB.get_or_init(|| match Oui::default() {
        Ok(db) => Some(db),
        Err(e) => {
            warn!(error = %e, "Failed to load OUI database, vendor lookups disabled");
            None
        }
    })
    .as_ref()
}

/// Look up the vendor name for a MAC address prefix. Absence of a match is
/// a normal outcome, not an error.
pub fn lookup_vendor(mac: &str) -> Option<String> {
    let db = oui_db()?;
    match db.lookup_by_mac(mac) {
        Ok(Some(entry)) => Some(entry.company_name.clone()),
        _ => None,
    }
}

/// Best-effort reverse DNS for a host, trimmed to the first label.
///
/// The synchronous resolver call runs on a blocking worker. Returns None
/// when resolution fails or when the resolver just echoes the IP back.
pub async fn resolve_hostname(ip: Ipv4Addr) -> Option<String> {
    let handle = tokio::task::spawn_blocking(move || {
        let addr = IpAddr::V4(ip);
        lookup_addr(&addr).ok()
    });

    let name = handle.await.ok().flatten()?;
    short_hostname(&name, ip)
}

/// Trim a resolved name to its first DNS label; reject resolver echoes of
/// the address itself.
fn short_hostname(name: &str, ip: Ipv4Addr) -> Option<String> {
    if name.is_empty() || name == ip.to_string() {
        return None;
    }
    name.split('.').next().map(|label| label.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_vendor_unknown_prefix() {
        // Locally administered address, never assigned to a vendor
        assert_eq!(lookup_vendor("02:00:00:00:00:01"), None);
    }

    #[test]
    fn test_short_hostname_takes_first_label() {
        let ip = Ipv4Addr::new(192, 168, 1, 50);
        assert_eq!(
            short_hostname("printer.lan.example.com", ip),
            Some("printer".to_string())
        );
        assert_eq!(short_hostname("nas", ip), Some("nas".to_string()));
    }

    #[test]
    fn test_short_hostname_rejects_ip_echo() {
        let ip = Ipv4Addr::new(192, 168, 1, 50);
        assert_eq!(short_hostname("192.168.1.50", ip), None);
        assert_eq!(short_hostname("", ip), None);
    }
}
