//! Host discovery: ICMP ping warm-up followed by a broadcast ARP sweep
//!
//! The ping pass only warms the OS neighbor cache so the ARP sweep gets
//! more replies; individual ping failures mean "unreachable or filtered"
//! and are ignored. The ARP sweep is the authoritative source of
//! (ip, mac, latency) observations and runs on a blocking worker so the
//! runtime is never stalled by the raw socket.

use anyhow::{bail, Context, Result};
use pnet::datalink::{self, Channel, NetworkInterface};
use pnet::ipnetwork::Ipv4Network;
use pnet::packet::arp::{ArpHardwareTypes, ArpOperations, ArpPacket, MutableArpPacket};
use pnet::packet::ethernet::{EtherTypes, EthernetPacket, MutableEthernetPacket};
use pnet::packet::Packet;
use pnet::util::MacAddr;
use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinSet;
use tracing::{debug, trace, warn};

use crate::net::host_addresses;

const ETH_HEADER_LEN: usize = 14;
const ARP_PACKET_LEN: usize = 28;

/// Cap on simultaneously outstanding warm-up pings. A /24 fits in one
/// batch; larger subnets are chunked to avoid exhausting OS resources.
const WARMUP_CONCURRENCY: usize = 254;

/// Delay between the warm-up sweep and the ARP sweep, letting neighbor
/// cache updates propagate
const SETTLE_DELAY: Duration = Duration::from_millis(500);

/// How long each raw-socket read may block before the deadline is rechecked
const CHANNEL_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// One host found by the ARP sweep
#[derive(Debug, Clone)]
pub struct DiscoveredHost {
    pub ip: Ipv4Addr,
    pub mac: MacAddr,
    /// Elapsed time since sweep start when the reply arrived
    pub response_time_ms: f64,
}

/// Discover live hosts on `network`, delivering each one over `found_tx`
/// as soon as its ARP reply arrives.
///
/// Returns the number of distinct hosts found. Channel or interface
/// failures abort the whole sweep; they are scan-level errors.
pub async fn discover(
    interface: NetworkInterface,
    network: Ipv4Network,
    arp_timeout: Duration,
    found_tx: UnboundedSender<DiscoveredHost>,
) -> Result<usize> {
    let targets = host_addresses(&network);

    ping_sweep(&targets).await;
    tokio::time::sleep(SETTLE_DELAY).await;

    let count = tokio::task::spawn_blocking(move || {
        arp_sweep(&interface, network, &targets, arp_timeout, found_tx)
    })
    .await
    .context("ARP sweep task panicked")??;

    Ok(count)
}

/// Ping every target once to populate the neighbor cache.
///
/// A host that stays silent here is still reported if it answers the ARP
/// sweep; this pass is an optimization, not a filter.
async fn ping_sweep(targets: &[Ipv4Addr]) {
    debug!("Ping warm-up sweep over {} hosts", targets.len());

    for chunk in targets.chunks(WARMUP_CONCURRENCY) {
        let mut tasks = JoinSet::new();

        for &ip in chunk {
            tasks.spawn(async move {
                let _ = tokio::process::Command::new("ping")
                    .args(["-c", "1", "-W", "0.3", &ip.to_string()])
                    .stdout(std::process::Stdio::null())
                    .stderr(std::process::Stdio::null())
                    .status()
                    .await;
            });
        }

        while tasks.join_next().await.is_some() {}
    }

    debug!("Ping warm-up sweep finished");
}

/// Broadcast one ARP request per target and collect replies until the
/// deadline. Blocking; must run off the async runtime.
fn arp_sweep(
    interface: &NetworkInterface,
    network: Ipv4Network,
    targets: &[Ipv4Addr],
    timeout: Duration,
    found_tx: UnboundedSender<DiscoveredHost>,
) -> Result<usize> {
    let source_mac = interface
        .mac
        .with_context(|| format!("interface {} has no MAC address", interface.name))?;
    let source_ip = crate::net::interface_ipv4(interface)
        .with_context(|| format!("interface {} has no IPv4 address", interface.name))?
        .ip();

    let config = datalink::Config {
        read_timeout: Some(CHANNEL_READ_TIMEOUT),
        ..Default::default()
    };
    let (mut tx, mut rx) = match datalink::channel(interface, config)
        .with_context(|| format!("opening datalink channel on {}", interface.name))?
    {
        Channel::Ethernet(tx, rx) => (tx, rx),
        _ => bail!("non-ethernet channel on {}", interface.name),
    };

    let start = Instant::now();

    for &target in targets {
        let packet = build_arp_request(source_mac, source_ip, target)?;
        if let Some(Err(e)) = tx.send_to(&packet, None) {
            bail!("failed to send ARP request on {}: {}", interface.name, e);
        }
    }

    debug!(
        interface = %interface.name,
        targets = targets.len(),
        "ARP requests sent, collecting replies"
    );

    let deadline = start + timeout;
    let mut seen: HashSet<MacAddr> = HashSet::new();
    let mut found = 0usize;

    while Instant::now() < deadline {
        let frame = match rx.next() {
            Ok(frame) => frame,
            // Read timeouts just mean no frame arrived this window
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => continue,
            Err(e) => {
                warn!(error = %e, "Datalink read error, ending sweep");
                break;
            }
        };

        let Some(host) = parse_arp_reply(frame, start) else {
            continue;
        };
        if host.mac == source_mac || host.ip == source_ip {
            continue;
        }
        if !network.contains(host.ip) {
            trace!(ip = %host.ip, "ARP reply from outside the scanned subnet");
            continue;
        }
        // Duplicate replies for the same hardware address keep the first
        if !seen.insert(host.mac) {
            continue;
        }

        found += 1;
        if found_tx.send(host).is_err() {
            // Consumer is gone, no point finishing the collection window
            break;
        }
    }

    debug!(found, "ARP sweep finished");
    Ok(found)
}

/// Build an Ethernet-framed broadcast ARP request for one target
fn build_arp_request(
    source_mac: MacAddr,
    source_ip: Ipv4Addr,
    target: Ipv4Addr,
) -> Result<Vec<u8>> {
    let mut buffer = vec![0u8; ETH_HEADER_LEN + ARP_PACKET_LEN];

    {
        let mut eth = MutableEthernetPacket::new(&mut buffer)
            .context("failed to create ethernet header")?;
        eth.set_destination(MacAddr::broadcast());
        eth.set_source(source_mac);
        eth.set_ethertype(EtherTypes::Arp);
    }

    let mut arp = MutableArpPacket::new(&mut buffer[ETH_HEADER_LEN..])
        .context("failed to create ARP packet")?;
    arp.set_hardware_type(ArpHardwareTypes::Ethernet);
    arp.set_protocol_type(EtherTypes::Ipv4);
    arp.set_hw_addr_len(6);
    arp.set_proto_addr_len(4);
    arp.set_operation(ArpOperations::Request);
    arp.set_sender_hw_addr(source_mac);
    arp.set_sender_proto_addr(source_ip);
    arp.set_target_hw_addr(MacAddr::zero());
    arp.set_target_proto_addr(target);

    Ok(buffer)
}

/// Extract a host observation from an incoming frame, if it is an ARP reply
fn parse_arp_reply(frame: &[u8], sweep_start: Instant) -> Option<DiscoveredHost> {
    let eth = EthernetPacket::new(frame)?;
    if eth.get_ethertype() != EtherTypes::Arp {
        return None;
    }
    let arp = ArpPacket::new(eth.payload())?;
    if arp.get_operation() != ArpOperations::Reply {
        return None;
    }

    let elapsed = sweep_start.elapsed().as_secs_f64() * 1000.0;
    Some(DiscoveredHost {
        ip: arp.get_sender_proto_addr(),
        mac: arp.get_sender_hw_addr(),
        response_time_ms: (elapsed * 100.0).round() / 100.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_arp_request_shape() {
        let src_mac = MacAddr::new(0x01, 0x02, 0x03, 0x04, 0x05, 0x06);
        let src_ip = Ipv4Addr::new(192, 168, 1, 10);
        let target = Ipv4Addr::new(192, 168, 1, 77);

        let buffer = build_arp_request(src_mac, src_ip, target).unwrap();
        let eth = EthernetPacket::new(&buffer).unwrap();
        assert_eq!(eth.get_destination(), MacAddr::broadcast());
        assert_eq!(eth.get_source(), src_mac);
        assert_eq!(eth.get_ethertype(), EtherTypes::Arp);

        let arp = ArpPacket::new(eth.payload()).unwrap();
        assert_eq!(arp.get_operation(), ArpOperations::Request);
        assert_eq!(arp.get_sender_hw_addr(), src_mac);
        assert_eq!(arp.get_sender_proto_addr(), src_ip);
        assert_eq!(arp.get_target_proto_addr(), target);
    }

    #[test]
    fn test_parse_arp_reply_roundtrip() {
        let replier_mac = MacAddr::new(0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF);
        let replier_ip = Ipv4Addr::new(192, 168, 1, 77);

        let mut buffer = vec![0u8; ETH_HEADER_LEN + ARP_PACKET_LEN];
        {
            let mut eth = MutableEthernetPacket::new(&mut buffer).unwrap();
            eth.set_destination(MacAddr::new(0x01, 0x02, 0x03, 0x04, 0x05, 0x06));
            eth.set_source(replier_mac);
            eth.set_ethertype(EtherTypes::Arp);
        }
        {
            let mut arp = MutableArpPacket::new(&mut buffer[ETH_HEADER_LEN..]).unwrap();
            arp.set_hardware_type(ArpHardwareTypes::Ethernet);
            arp.set_protocol_type(EtherTypes::Ipv4);
            arp.set_hw_addr_len(6);
            arp.set_proto_addr_len(4);
            arp.set_operation(ArpOperations::Reply);
            arp.set_sender_hw_addr(replier_mac);
            arp.set_sender_proto_addr(replier_ip);
        }

        let host = parse_arp_reply(&buffer, Instant::now()).unwrap();
        assert_eq!(host.ip, replier_ip);
        assert_eq!(host.mac, replier_mac);
        assert!(host.response_time_ms >= 0.0);
    }

    #[test]
    fn test_parse_arp_reply_ignores_requests() {
        let mac = MacAddr::new(0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF);
        let buffer = build_arp_request(mac, Ipv4Addr::new(192, 168, 1, 1), Ipv4Addr::new(192, 168, 1, 2)).unwrap();
        assert!(parse_arp_reply(&buffer, Instant::now()).is_none());
    }

    #[test]
    fn test_parse_arp_reply_ignores_non_arp() {
        let mut buffer = vec![0u8; ETH_HEADER_LEN + ARP_PACKET_LEN];
        let mut eth = MutableEthernetPacket::new(&mut buffer).unwrap();
        eth.set_ethertype(EtherTypes::Ipv4);
        drop(eth);
        assert!(parse_arp_reply(&buffer, Instant::now()).is_none());
    }
}
