//! Heuristic device-type classification
//!
//! Maps a vendor name, hostname, and open-port set to a device category.
//! The rules form an ordered decision list: the first match wins, and the
//! order is load-bearing. A router-brand device that looks phone-like is
//! still a router because rule 1 runs before rule 2.

use crate::device::DeviceType;

const ROUTER_VENDORS: &[&str] = &[
    "cisco", "netgear", "tp-link", "tplink", "asus", "d-link", "linksys", "ubiquiti", "mikrotik",
    "huawei",
];

const MOBILE_VENDORS: &[&str] = &[
    "apple",
    "samsung",
    "xiaomi",
    "huawei",
    "oneplus",
    "google",
    "motorola",
    "lg electronics",
];

const PRINTER_VENDORS: &[&str] = &["hp", "epson", "canon", "brother", "lexmark", "xerox"];

const IOT_VENDORS: &[&str] = &[
    "amazon",
    "sonos",
    "ring",
    "nest",
    "philips hue",
    "espressif",
    "tuya",
    "shelly",
];

const SERVER_HOSTNAMES: &[&str] = &["server", "nas", "storage", "proxmox", "esxi"];

fn matches_any(haystack: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|kw| haystack.contains(kw))
}

/// Classify a device from its vendor, hostname, and open ports.
///
/// Pure and deterministic: no I/O, no clock, same inputs always yield the
/// same output.
pub fn classify(vendor: Option<&str>, hostname: Option<&str>, open_ports: &[u16]) -> DeviceType {
    let vendor_lower = vendor.unwrap_or("").to_lowercase();
    let hostname_lower = hostname.unwrap_or("").to_lowercase();

    let has_port = |p: u16| open_ports.contains(&p);

    if matches_any(&vendor_lower, ROUTER_VENDORS) && (has_port(80) || has_port(443)) {
        return DeviceType::Router;
    }

    if matches_any(&vendor_lower, MOBILE_VENDORS)
        && ![22, 80, 443, 445].iter().any(|&p| has_port(p))
    {
        return DeviceType::Mobile;
    }

    if matches_any(&vendor_lower, PRINTER_VENDORS) {
        return DeviceType::Printer;
    }

    if matches_any(&vendor_lower, IOT_VENDORS) {
        return DeviceType::Iot;
    }

    if matches_any(&hostname_lower, SERVER_HOSTNAMES) {
        return DeviceType::Server;
    }

    if has_port(22) && has_port(3306) {
        return DeviceType::Server;
    }

    if [445, 3389, 5900].iter().any(|&p| has_port(p)) {
        return DeviceType::Computer;
    }

    // A resolved vendor with nothing more specific still indicates a
    // general-purpose machine rather than a complete unknown
    if vendor.is_some() {
        return DeviceType::Computer;
    }

    DeviceType::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_router_vendor_with_web_port() {
        assert_eq!(
            classify(Some("TP-Link"), None, &[80]),
            DeviceType::Router
        );
        assert_eq!(
            classify(Some("Ubiquiti Networks"), None, &[443]),
            DeviceType::Router
        );
    }

    #[test]
    fn test_router_vendor_without_web_port_falls_through() {
        // Scenario: TP-Link with no open ports resolves through the
        // vendor-resolved fallback, not the router rule
        assert_eq!(classify(Some("TP-Link"), None, &[]), DeviceType::Computer);
    }

    #[test]
    fn test_router_rule_beats_mobile_rule() {
        // Huawei appears in both the router and mobile lists; with a web
        // port open the router rule must win
        assert_eq!(classify(Some("Huawei"), None, &[80]), DeviceType::Router);
        // Without any of {22,80,443,445} it drops to the mobile rule
        assert_eq!(classify(Some("Huawei"), None, &[]), DeviceType::Mobile);
    }

    #[test]
    fn test_mobile_vendor_with_service_ports_is_not_mobile() {
        assert_eq!(classify(Some("Apple, Inc."), None, &[]), DeviceType::Mobile);
        // An Apple machine exposing SSH is not a phone
        assert_ne!(classify(Some("Apple, Inc."), None, &[22]), DeviceType::Mobile);
    }

    #[test]
    fn test_printer_vendor() {
        assert_eq!(
            classify(Some("Brother Industries"), None, &[]),
            DeviceType::Printer
        );
    }

    #[test]
    fn test_iot_vendor() {
        assert_eq!(
            classify(Some("Espressif Inc."), None, &[80]),
            DeviceType::Iot
        );
    }

    #[test]
    fn test_server_hostname() {
        assert_eq!(
            classify(None, Some("home-nas"), &[]),
            DeviceType::Server
        );
        assert_eq!(
            classify(None, Some("proxmox01"), &[]),
            DeviceType::Server
        );
    }

    #[test]
    fn test_server_by_ssh_and_mysql() {
        assert_eq!(classify(None, None, &[22, 3306]), DeviceType::Server);
        assert_ne!(classify(None, None, &[22]), DeviceType::Server);
    }

    #[test]
    fn test_computer_by_desktop_ports() {
        assert_eq!(classify(None, None, &[445]), DeviceType::Computer);
        assert_eq!(classify(None, None, &[3389]), DeviceType::Computer);
        assert_eq!(classify(None, None, &[5900]), DeviceType::Computer);
    }

    #[test]
    fn test_unmatched_vendor_is_computer() {
        assert_eq!(
            classify(Some("Some Obscure Corp"), None, &[]),
            DeviceType::Computer
        );
    }

    #[test]
    fn test_nothing_resolved_is_unknown() {
        assert_eq!(classify(None, None, &[]), DeviceType::Unknown);
        assert_eq!(classify(None, None, &[8080]), DeviceType::Unknown);
    }

    #[test]
    fn test_deterministic() {
        let first = classify(Some("Samsung"), Some("galaxy"), &[8080]);
        for _ in 0..10 {
            assert_eq!(classify(Some("Samsung"), Some("galaxy"), &[8080]), first);
        }
    }
}
