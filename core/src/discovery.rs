//! # Network Discovery Service
//!
//! Implements the "scan a range" use case end to end.
//!
//! This service snapshots the neighbor table, fans probes out over every usable address of the
//! requested subnets, and feeds each reachable host into the [`Reconciler`]. Results surface
//! only as persisted inventory state plus a [`ScanSummary`].

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use ledgr_common::config::Config;
use ledgr_common::error::{ScanError, StoreError};
use ledgr_common::inventory::InventoryRepository;
use ledgr_common::network::host::Host;
use ledgr_common::network::neighbors::ArpTable;
use ledgr_common::network::range::{Ipv4Range, Subnet, merge_ranges};
use ledgr_common::scanning::{HostProber, NeighborTable, ProbeOutcome, ScanContext};

use crate::network::arp::SystemArpTable;
use crate::reconciler::{Reconciler, Reconciliation};
use crate::scanner::{LiveProber, Scheduler, TaskOutcome};

/// Acknowledgment of an accepted scan.
///
/// Dropping the ticket detaches the scan; [`ScanTicket::wait`] joins it.
#[derive(Debug)]
pub struct ScanTicket {
    pub id: Uuid,
    pub accepted_at: DateTime<Utc>,
    handle: JoinHandle<Result<ScanSummary, ScanError>>,
}

impl ScanTicket {
    pub async fn wait(self) -> Result<ScanSummary, ScanError> {
        self.handle
            .await
            .map_err(|e| ScanError::Task(e.to_string()))?
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanSummary {
    pub scan_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub subnets: Vec<Subnet>,
    pub probed: usize,
    pub reachable: usize,
    /// Reachable hosts without a hardware address, reported but not persisted.
    pub transient: usize,
    pub new_devices: usize,
    pub ip_changes: usize,
    pub conflicts: usize,
    pub reservation_violations: usize,
    pub services: usize,
    pub failed_tasks: usize,
    pub persistence_errors: usize,
    pub hosts: Vec<Host>,
}

impl ScanSummary {
    fn record(&mut self, host: Host, reconciled: Result<Reconciliation, StoreError>) {
        self.reachable += 1;
        match reconciled {
            Ok(report) => {
                if !report.persisted {
                    self.transient += 1;
                }
                self.new_devices += usize::from(report.new_device);
                self.ip_changes += usize::from(report.ip_changed);
                self.conflicts += usize::from(report.conflict);
                self.reservation_violations += usize::from(report.reservation_violated);
                self.services += report.services;
            }
            Err(err) => {
                warn!(ip = %host.ip, "failed to persist host: {err}");
                self.persistence_errors += 1;
            }
        }
        self.hosts.push(host);
    }
}

enum HostReport {
    Unreachable,
    Found {
        host: Host,
        reconciled: Result<Reconciliation, StoreError>,
    },
}

/// Application Service for Network Discovery.
///
/// Cheap to clone; clones share the store, the probers and the scan lock.
#[derive(Clone)]
pub struct DiscoveryService {
    prober: Arc<dyn HostProber>,
    neighbors: Arc<dyn NeighborTable>,
    reconciler: Arc<Reconciler>,
    scheduler: Scheduler,
    scan_lock: Arc<Mutex<()>>,
}

impl DiscoveryService {
    pub fn new(
        store: Arc<dyn InventoryRepository>,
        prober: Arc<dyn HostProber>,
        neighbors: Arc<dyn NeighborTable>,
        window: usize,
    ) -> Self {
        Self {
            prober,
            neighbors,
            reconciler: Arc::new(Reconciler::new(store)),
            scheduler: Scheduler::new(window),
            scan_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Wires the live probers and the system neighbor table from configuration.
    pub fn from_config(store: Arc<dyn InventoryRepository>, config: &Config) -> anyhow::Result<Self> {
        let prober = LiveProber::from_config(&config.probe, &config.vendor)?;
        Ok(Self::new(
            store,
            Arc::new(prober),
            Arc::new(SystemArpTable),
            config.scan.window(),
        ))
    }

    /// Accepts a scan and runs it in the background.
    ///
    /// Scans never overlap: one requested while another is running starts once it finishes.
    pub fn perform_scan(&self, subnets: Vec<Subnet>, port_scan: bool) -> Result<ScanTicket, ScanError> {
        if subnets.is_empty() {
            return Err(ScanError::Validation {
                input: String::new(),
                reason: "no address range given".to_string(),
            });
        }

        let id = Uuid::new_v4();
        let accepted_at = Utc::now();
        let service = self.clone();
        let span = info_span!("scan", %id);
        let handle = tokio::spawn(
            async move { service.execute(id, subnets, port_scan).await }.instrument(span),
        );

        Ok(ScanTicket {
            id,
            accepted_at,
            handle,
        })
    }

    /// Runs a scan to completion on the current task.
    pub async fn run_scan(&self, subnets: &[Subnet], port_scan: bool) -> Result<ScanSummary, ScanError> {
        self.perform_scan(subnets.to_vec(), port_scan)?.wait().await
    }

    /// Scans every subnet on a fixed interval until `cancel` fires.
    ///
    /// Each subnet is scanned on its own, so a failing range does not hold up the others.
    /// Ticks that fall due while a scan is still running are skipped.
    pub async fn run_periodic(
        &self,
        subnets: Vec<Subnet>,
        port_scan: bool,
        every: Duration,
        cancel: CancellationToken,
    ) {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            for subnet in &subnets {
                if cancel.is_cancelled() {
                    break;
                }
                if let Err(err) = self.run_scan(std::slice::from_ref(subnet), port_scan).await {
                    error!(%subnet, "scheduled scan failed: {err}");
                }
            }
        }
        info!("periodic scanning stopped");
    }

    async fn execute(
        &self,
        id: Uuid,
        subnets: Vec<Subnet>,
        port_scan: bool,
    ) -> Result<ScanSummary, ScanError> {
        let _scan = self.scan_lock.lock().await;

        let neighbors = match self.neighbors.snapshot().await {
            Ok(table) => table,
            Err(err) => {
                warn!("neighbor table unavailable, hardware addresses will be missing: {err:#}");
                ArpTable::new()
            }
        };
        debug!(entries = neighbors.len(), "neighbor table snapshot taken");

        let mut ctx = ScanContext::new(neighbors, port_scan);
        ctx.id = id;
        let ctx = Arc::new(ctx);

        // Overlapping subnets are merged so each address is scanned once.
        let ranges = merge_ranges(subnets.iter().map(Subnet::usable_hosts));
        let probed: usize = ranges.iter().map(Ipv4Range::len).sum();
        let targets = ranges.into_iter().flat_map(|range| range.iter());

        let mut summary = ScanSummary {
            scan_id: id,
            started_at: ctx.started_at,
            subnets,
            probed,
            ..ScanSummary::default()
        };
        info!(
            targets = summary.probed,
            window = self.scheduler.window(),
            port_scan,
            "scan started"
        );

        let outcomes = self
            .scheduler
            .run(targets, |ip| {
                let prober = Arc::clone(&self.prober);
                let reconciler = Arc::clone(&self.reconciler);
                let ctx = Arc::clone(&ctx);
                async move {
                    match prober.probe(ip, &ctx).await {
                        ProbeOutcome::Unreachable(err) => {
                            debug!(%ip, "{err}");
                            HostReport::Unreachable
                        }
                        ProbeOutcome::Found(host) => {
                            let reconciled = reconciler.reconcile(&host).await;
                            HostReport::Found { host, reconciled }
                        }
                    }
                }
            })
            .await;

        for outcome in outcomes {
            match outcome {
                TaskOutcome::Completed(HostReport::Unreachable) => {}
                TaskOutcome::Completed(HostReport::Found { host, reconciled }) => {
                    summary.record(host, reconciled);
                }
                TaskOutcome::Panicked { .. } => summary.failed_tasks += 1,
            }
        }
        summary.hosts.sort_by_key(|host| host.ip);
        summary.finished_at = Utc::now();

        info!(
            reachable = summary.reachable,
            new_devices = summary.new_devices,
            ip_changes = summary.ip_changes,
            conflicts = summary.conflicts,
            services = summary.services,
            "scan complete"
        );
        Ok(summary)
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
