use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::trace;

use ledgr_common::error::ResolutionError;
use ledgr_protocols::dns;

const DNS_PORT: u16 = 53;
const RESOLV_CONF: &str = "/etc/resolv.conf";
const MAX_DATAGRAM: usize = 1_500;

/// Reverse (PTR) lookups against a single recursive resolver.
#[derive(Debug, Clone)]
pub struct ReverseResolver {
    server: Option<SocketAddr>,
    timeout: Duration,
}

impl ReverseResolver {
    pub fn new(server: Option<SocketAddr>, timeout: Duration) -> Self {
        Self { server, timeout }
    }

    /// Uses the first `nameserver` of the system resolver configuration.
    pub fn from_system(timeout: Duration) -> Self {
        Self::new(system_nameserver(RESOLV_CONF), timeout)
    }

    pub async fn lookup(&self, ip: IpAddr) -> Result<String, ResolutionError> {
        let server = self.server.ok_or(ResolutionError::NoResolver)?;
        timeout(self.timeout, query(ip, server))
            .await
            .map_err(|_elapsed| ResolutionError::Timeout {
                ip,
                timeout: self.timeout,
            })?
    }
}

async fn query(ip: IpAddr, server: SocketAddr) -> Result<String, ResolutionError> {
    let failed = |reason: String| ResolutionError::LookupFailed { ip, reason };

    let local: SocketAddr = match server {
        SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
    };
    let socket = UdpSocket::bind(local)
        .await
        .map_err(|e| failed(format!("bind: {e}")))?;
    socket
        .connect(server)
        .await
        .map_err(|e| failed(format!("connect {server}: {e}")))?;

    let id: u16 = rand::random();
    let packet = dns::create_ptr_packet(&ip, id).map_err(|e| failed(e.to_string()))?;
    socket
        .send(&packet)
        .await
        .map_err(|e| failed(format!("send: {e}")))?;

    let mut buf = [0u8; MAX_DATAGRAM];
    loop {
        let len = socket
            .recv(&mut buf)
            .await
            .map_err(|e| failed(format!("recv: {e}")))?;

        match dns::get_hostname(&buf[..len]) {
            Ok(answer) if answer.id == id => {
                return answer
                    .hostname
                    .ok_or_else(|| failed("no PTR record".to_string()));
            }
            Ok(answer) => trace!(%ip, id = answer.id, "ignoring answer for another query"),
            Err(e) => trace!(%ip, "ignoring malformed datagram: {e}"),
        }
    }
}

fn system_nameserver(path: impl AsRef<Path>) -> Option<SocketAddr> {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|contents| parse_resolv_conf(&contents))
}

/// First usable `nameserver` entry of a resolv.conf file.
pub fn parse_resolv_conf(contents: &str) -> Option<SocketAddr> {
    contents.lines().find_map(|line| {
        let mut fields = line.split_whitespace();
        if fields.next()? != "nameserver" {
            return None;
        }
        let entry = fields.next()?;
        // Zoned link-local servers (fe80::1%eth0) need an interface index; skip to the next one.
        if entry.contains('%') {
            return None;
        }
        let addr: IpAddr = entry.parse().ok()?;
        Some(SocketAddr::new(addr, DNS_PORT))
    })
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
