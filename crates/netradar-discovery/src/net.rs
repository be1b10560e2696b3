//! Local interface and subnet detection

use anyhow::{Context, Result};
use pnet::datalink::{self, NetworkInterface};
use pnet::ipnetwork::{IpNetwork, Ipv4Network};
use std::net::Ipv4Addr;
use tracing::debug;

/// Pick the interface used for LAN discovery.
///
/// The first interface that is up, not loopback, carries a MAC address and
/// a private IPv4 address wins. ARP sweeping needs all four.
pub fn usable_interface() -> Result<NetworkInterface> {
    let interfaces = datalink::interfaces();
    debug!("Found {} network interfaces", interfaces.len());

    interfaces
        .into_iter()
        .find(|intf| {
            intf.is_up()
                && !intf.is_loopback()
                && intf.mac.is_some()
                && interface_ipv4(intf).map(|net| net.ip().is_private()).unwrap_or(false)
        })
        .context("no usable network interface for LAN discovery")
}

/// First IPv4 network assigned to an interface
pub fn interface_ipv4(intf: &NetworkInterface) -> Option<Ipv4Network> {
    intf.ips.iter().find_map(|net| match net {
        IpNetwork::V4(v4) => Some(*v4),
        _ => None,
    })
}

/// Derive the subnet under scan and the assumed gateway for an interface.
///
/// Scans the /24 around the interface address and assumes the gateway is
/// host .1, regardless of the interface's real prefix length.
pub fn local_network(intf: &NetworkInterface) -> Result<(Ipv4Network, Ipv4Addr)> {
    let addr = interface_ipv4(intf)
        .context("interface has no IPv4 address")?
        .ip();

    let octets = addr.octets();
    let base = Ipv4Addr::new(octets[0], octets[1], octets[2], 0);
    let network = Ipv4Network::new(base, 24)?;
    let gateway = first_host(&network);

    Ok((network, gateway))
}

/// First usable host address of a network (the conventional gateway slot)
pub fn first_host(network: &Ipv4Network) -> Ipv4Addr {
    Ipv4Addr::from(u32::from(network.network()) + 1)
}

/// Usable host addresses of a network, excluding network and broadcast
pub fn host_addresses(network: &Ipv4Network) -> Vec<Ipv4Addr> {
    let base = network.network();
    let broadcast = network.broadcast();
    network
        .iter()
        .filter(|ip| *ip != base && *ip != broadcast)
        .collect()
}
