//! Contracts between the scan orchestrator and the components that touch the network.

use std::net::Ipv4Addr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::ProbeError;
use crate::network::host::Host;
use crate::network::neighbors::ArpTable;

/// State owned by a single scan and shared read-only with all of its probe tasks.
#[derive(Debug, Clone)]
pub struct ScanContext {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub neighbors: ArpTable,
    pub port_scan: bool,
}

impl ScanContext {
    pub fn new(neighbors: ArpTable, port_scan: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            neighbors,
            port_scan,
        }
    }
}

/// Result of probing one address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Found(Host),
    /// The host did not prove it is up; the reason is kept for logging.
    Unreachable(ProbeError),
}

/// Probes a single address: reachability, enrichment and (optionally) services.
#[async_trait]
pub trait HostProber: Send + Sync {
    async fn probe(&self, ip: Ipv4Addr, ctx: &ScanContext) -> ProbeOutcome;
}

/// Source of the address-resolution table snapshot taken at scan start.
#[async_trait]
pub trait NeighborTable: Send + Sync {
    async fn snapshot(&self) -> anyhow::Result<ArpTable>;
}
