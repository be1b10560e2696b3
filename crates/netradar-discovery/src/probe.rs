//! TCP connect-scanning of well-known ports
//!
//! A port is open only when the full handshake completes before the
//! timeout. Timeouts, refusals, and every other connection error all mean
//! "closed or filtered" and are absorbed without surfacing to the caller.

use netradar_core::Port;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::trace;

/// Default per-port handshake timeout
pub const DEFAULT_PORT_TIMEOUT: Duration = Duration::from_secs(1);

/// Well-known ports checked by the on-demand deep probe
pub const FULL_PROFILE: &[u16] = &[
    21, 22, 23, 25, 53, 80, 110, 143, 443, 445, 993, 995, 3306, 3389, 5432, 5900, 8080, 8443,
];

/// Short list used during live discovery to keep scan latency low
pub const QUICK_PROFILE: &[u16] = &[22, 80, 443, 445, 3389, 8080];

/// Service name for a well-known port, empty string when unknown
pub fn service_name(port: u16) -> &'static str {
    match port {
        21 => "FTP",
        22 => "SSH",
        23 => "Telnet",
        25 => "SMTP",
        53 => "DNS",
        80 => "HTTP",
        110 => "POP3",
        143 => "IMAP",
        443 => "HTTPS",
        445 => "SMB",
        631 => "IPP",
        993 => "IMAPS",
        995 => "POP3S",
        3306 => "MySQL",
        3389 => "RDP",
        5432 => "PostgreSQL",
        5900 => "VNC",
        8080 => "HTTP-Proxy",
        8443 => "HTTPS-Alt",
        9100 => "JetDirect",
        _ => "",
    }
}

/// Attempt a TCP handshake against one port
async fn check_port(ip: Ipv4Addr, port: u16, handshake_timeout: Duration) -> Option<Port> {
    let addr = SocketAddr::from((ip, port));
    match timeout(handshake_timeout, TcpStream::connect(addr)).await {
        Ok(Ok(_stream)) => Some(Port::open_tcp(port, service_name(port))),
        Ok(Err(e)) => {
            trace!(ip = %ip, port, error = %e, "Port closed");
            None
        }
        Err(_elapsed) => None,
    }
}

/// Probe `ports` on one host concurrently, each with an independent
/// timeout, and return the open ones sorted by port number.
pub async fn probe(ip: Ipv4Addr, ports: &[u16], handshake_timeout: Duration) -> Vec<Port> {
    let mut tasks = JoinSet::new();

    for &port in ports {
        tasks.spawn(async move { check_port(ip, port, handshake_timeout).await });
    }

    let mut open = Vec::new();
    while let Some(result) = tasks.join_next().await {
        if let Ok(Some(port)) = result {
            open.push(port);
        }
    }

    open.sort_by_key(|p| p.number);
    open
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_service_names() {
        assert_eq!(service_name(443), "HTTPS");
        assert_eq!(service_name(22), "SSH");
        assert_eq!(service_name(9100), "JetDirect");
        assert_eq!(service_name(631), "IPP");
        assert_eq!(service_name(49152), "");
    }

    #[test]
    fn test_profiles() {
        assert_eq!(FULL_PROFILE.len(), 18);
        // The quick profile is a strict subset of the full profile
        assert!(QUICK_PROFILE.iter().all(|p| FULL_PROFILE.contains(p)));
    }

    #[tokio::test]
    async fn test_probe_finds_listening_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let open_port = listener.local_addr().unwrap().port();
        let localhost = Ipv4Addr::LOCALHOST;

        let result = probe(localhost, &[open_port], DEFAULT_PORT_TIMEOUT).await;
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].number, open_port);
        assert_eq!(result[0].protocol, "tcp");
        assert_eq!(result[0].state, "open");
    }

    #[tokio::test]
    async fn test_probe_absorbs_closed_ports() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let open_port = listener.local_addr().unwrap().port();
        // Grab a second ephemeral port and release it so it is closed
        let closed_port = {
            let tmp = TcpListener::bind("127.0.0.1:0").await.unwrap();
            tmp.local_addr().unwrap().port()
        };
        let localhost = Ipv4Addr::LOCALHOST;

        let result = probe(localhost, &[closed_port, open_port], DEFAULT_PORT_TIMEOUT).await;
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].number, open_port);
    }

    #[tokio::test]
    async fn test_probe_results_sorted_by_port() {
        let a = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let b = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut ports = vec![
            a.local_addr().unwrap().port(),
            b.local_addr().unwrap().port(),
        ];

        let result = probe(Ipv4Addr::LOCALHOST, &ports, DEFAULT_PORT_TIMEOUT).await;
        ports.sort_unstable();
        let found: Vec<u16> = result.iter().map(|p| p.number).collect();
        assert_eq!(found, ports);
    }
}
