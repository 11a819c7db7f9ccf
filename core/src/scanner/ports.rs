//! Application-layer checks of a short list of candidate ports.
//!
//! A port only counts as open when something answered in the protocol we asked for. Refused
//! and timed-out attempts are simply closed ports, not errors.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use anyhow::Context;
use futures::future::join_all;
use reqwest::redirect::Policy;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::trace;

use ledgr_common::inventory::{ServiceKind, TransportProtocol};
use ledgr_common::network::host::OpenPort;
use ledgr_protocols::{http, ssh};

/// Only this much of a response body is searched for a `<title>`.
const MAX_BODY_BYTES: usize = 64 * 1024;
const MAX_BANNER_BYTES: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStrategy {
    Http,
    Https,
    Ssh,
    /// Ports that commonly serve either; plain is tried first.
    HttpThenHttps,
}

impl ProbeStrategy {
    pub fn for_port(port: u16) -> Self {
        match port {
            22 => ProbeStrategy::Ssh,
            80 => ProbeStrategy::Http,
            443 | 8443 => ProbeStrategy::Https,
            _ => ProbeStrategy::HttpThenHttps,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortSpec {
    pub port: u16,
    pub strategy: ProbeStrategy,
}

impl PortSpec {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            strategy: ProbeStrategy::for_port(port),
        }
    }
}

pub struct PortProber {
    client: reqwest::Client,
    ports: Vec<PortSpec>,
    timeout: Duration,
}

impl PortProber {
    pub fn new(ports: &[u16], timeout: Duration) -> anyhow::Result<Self> {
        Self::with_specs(ports.iter().copied().map(PortSpec::new).collect(), timeout)
    }

    pub fn with_specs(ports: Vec<PortSpec>, timeout: Duration) -> anyhow::Result<Self> {
        // Appliances ship self-signed certificates and redirect to login pages; either is
        // still an answer.
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .redirect(Policy::none())
            .no_proxy()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            ports,
            timeout,
        })
    }

    /// Probes every candidate port concurrently and returns the open ones in candidate order.
    pub async fn probe(&self, ip: IpAddr) -> Vec<OpenPort> {
        let attempts = self.ports.iter().map(|spec| self.probe_port(ip, *spec));
        join_all(attempts).await.into_iter().flatten().collect()
    }

    async fn probe_port(&self, ip: IpAddr, spec: PortSpec) -> Option<OpenPort> {
        match spec.strategy {
            ProbeStrategy::Http => self.probe_web(ip, spec.port, ServiceKind::Http).await,
            ProbeStrategy::Https => self.probe_web(ip, spec.port, ServiceKind::Https).await,
            ProbeStrategy::Ssh => self.probe_ssh(ip, spec.port).await,
            ProbeStrategy::HttpThenHttps => {
                match self.probe_web(ip, spec.port, ServiceKind::Http).await {
                    Some(open) => Some(open),
                    None => self.probe_web(ip, spec.port, ServiceKind::Https).await,
                }
            }
        }
    }

    async fn probe_web(&self, ip: IpAddr, port: u16, kind: ServiceKind) -> Option<OpenPort> {
        let url = http::service_url(kind, ip, port)?;
        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(err) => {
                trace!(%url, "no answer: {err}");
                return None;
            }
        };
        trace!(%url, status = %response.status(), "port answered");

        let title = read_title(response).await;
        Some(OpenPort {
            port,
            protocol: TransportProtocol::Tcp,
            kind,
            url: Some(url),
            title,
        })
    }

    async fn probe_ssh(&self, ip: IpAddr, port: u16) -> Option<OpenPort> {
        let addr = SocketAddr::new(ip, port);
        let banner = timeout(self.timeout, async {
            let mut stream = TcpStream::connect(addr).await?;
            let mut buf = [0u8; MAX_BANNER_BYTES];
            let len = stream.read(&mut buf).await?;
            Ok::<Vec<u8>, std::io::Error>(buf[..len].to_vec())
        })
        .await
        .ok()?
        .ok()?;

        let line = banner.split(|b| *b == b'\n').next().unwrap_or_default();
        let banner = ssh::parse_banner(line)?;
        Some(OpenPort {
            port,
            protocol: TransportProtocol::Tcp,
            kind: ServiceKind::Ssh,
            url: None,
            title: Some(banner),
        })
    }
}

async fn read_title(mut response: reqwest::Response) -> Option<String> {
    let mut body: Vec<u8> = Vec::new();
    while body.len() < MAX_BODY_BYTES {
        match response.chunk().await {
            Ok(Some(chunk)) => body.extend_from_slice(&chunk),
            Ok(None) | Err(_) => break,
        }
    }
    body.truncate(MAX_BODY_BYTES);
    http::extract_title(&String::from_utf8_lossy(&body))
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
