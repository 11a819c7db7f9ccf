//! # Probe Scheduling
//!
//! The [`Scheduler`] drives a bounded fan-out over the addresses of a scan: at most `window`
//! tasks are in flight, and each window fully settles before the next one is admitted. A failed
//! or panicking task never cancels its siblings; every outcome comes back as a value.
//!
//! [`LiveProber`] is the production [`HostProber`]: it resolves a host and, when the scan asks
//! for it, probes its candidate ports.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::net::{IpAddr, Ipv4Addr};

use async_trait::async_trait;
use tokio::task::JoinSet;
use tracing::warn;

use ledgr_common::config::{ProbeConfig, VendorConfig};
use ledgr_common::scanning::{HostProber, ProbeOutcome, ScanContext};

use crate::network::dns::ReverseResolver;
use crate::network::reachability::Reachability;
use crate::vendors::VendorLookup;

pub mod ports;
pub mod resolver;

use ports::PortProber;
use resolver::HostResolver;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome<T> {
    Completed(T),
    Panicked { ip: Ipv4Addr, reason: String },
}

#[derive(Debug, Clone, Copy)]
pub struct Scheduler {
    window: usize,
}

impl Scheduler {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Runs `task` once per target, at most `window` at a time.
    pub async fn run<I, F, Fut, T>(&self, targets: I, task: F) -> Vec<TaskOutcome<T>>
    where
        I: IntoIterator<Item = Ipv4Addr>,
        F: Fn(Ipv4Addr) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let mut outcomes = Vec::new();
        let mut targets = targets.into_iter().peekable();

        while targets.peek().is_some() {
            let mut batch = JoinSet::new();
            let mut spawned = HashMap::new();

            for ip in targets.by_ref().take(self.window) {
                let handle = batch.spawn(task(ip));
                spawned.insert(handle.id(), ip);
            }

            while let Some(joined) = batch.join_next_with_id().await {
                match joined {
                    Ok((_, value)) => outcomes.push(TaskOutcome::Completed(value)),
                    Err(err) => {
                        let Some(ip) = spawned.remove(&err.id()) else {
                            continue;
                        };
                        let reason = if err.is_panic() {
                            panic_message(err.into_panic())
                        } else {
                            err.to_string()
                        };
                        warn!(%ip, "probe task failed: {reason}");
                        outcomes.push(TaskOutcome::Panicked { ip, reason });
                    }
                }
            }
        }

        outcomes
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "task panicked".to_string()
    }
}

pub struct LiveProber {
    resolver: HostResolver,
    ports: PortProber,
}

impl LiveProber {
    pub fn new(resolver: HostResolver, ports: PortProber) -> Self {
        Self { resolver, ports }
    }

    pub fn from_config(probe: &ProbeConfig, vendor: &VendorConfig) -> anyhow::Result<Self> {
        let reachability = Reachability::new(probe.reachability, probe.reachability_timeout());
        let dns = (!probe.no_dns).then(|| match probe.dns_server {
            Some(server) => ReverseResolver::new(Some(server), probe.dns_timeout()),
            None => ReverseResolver::from_system(probe.dns_timeout()),
        });
        let resolver = HostResolver::new(reachability, dns, VendorLookup::standard(vendor.oui_database));
        let ports = PortProber::new(&probe.ports, probe.port_timeout())?;
        Ok(Self::new(resolver, ports))
    }
}

#[async_trait]
impl HostProber for LiveProber {
    async fn probe(&self, ip: Ipv4Addr, ctx: &ScanContext) -> ProbeOutcome {
        let mut host = match self.resolver.resolve(IpAddr::V4(ip), ctx).await {
            Ok(host) => host,
            Err(err) => return ProbeOutcome::Unreachable(err),
        };
        if ctx.port_scan {
            host.open_ports = self.ports.probe(host.ip).await;
        }
        ProbeOutcome::Found(host)
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
