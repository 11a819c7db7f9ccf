//! # Inventory Reconciliation
//!
//! Merges one observed [`Host`] into the persisted inventory:
//!
//! 1. **Device**: matched by the identifier derived from its hardware address; created (and
//!    announced with `new_device`) on first sighting, refreshed otherwise.
//! 2. **Leases**: a foreign active lease on the observed IP is released with a `conflict`; the
//!    device's own active leases on other IPs are released with an `ip_change`; a fresh lease is
//!    created unless the device already holds this IP. A fresh lease on a reserved IP that
//!    belongs to another hardware address raises a reservation `conflict`.
//! 3. **Services**: every open port is upserted on `(device, ip, port, protocol)`.
//!
//! Each reconciliation holds the locks of its device, its IP and the IP's current holder for its
//! whole duration.

use std::net::IpAddr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use ledgr_common::error::StoreError;
use ledgr_common::inventory::{
    Device, DeviceId, Event, InventoryRepository, IpLease, Service, ServiceKey,
};
use ledgr_common::network::host::Host;
use ledgr_common::network::mac::MacAddr;

use crate::events::EventEmitter;

pub mod locks;

use locks::{KeyedGuard, KeyedLocks, LockKey};

/// What a single reconciliation changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    pub device_id: DeviceId,
    pub ip: IpAddr,
    /// `false` for hosts without a hardware address; nothing was written for them.
    pub persisted: bool,
    pub new_device: bool,
    pub ip_changed: bool,
    pub conflict: bool,
    pub reservation_violated: bool,
    pub services: usize,
}

impl Reconciliation {
    fn new(device_id: DeviceId, ip: IpAddr) -> Self {
        Self {
            device_id,
            ip,
            persisted: true,
            new_device: false,
            ip_changed: false,
            conflict: false,
            reservation_violated: false,
            services: 0,
        }
    }
}

pub struct Reconciler {
    store: Arc<dyn InventoryRepository>,
    events: EventEmitter,
    locks: KeyedLocks<LockKey>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn InventoryRepository>) -> Self {
        Self {
            events: EventEmitter::new(Arc::clone(&store)),
            store,
            locks: KeyedLocks::new(),
        }
    }

    pub async fn reconcile(&self, host: &Host) -> Result<Reconciliation, StoreError> {
        self.reconcile_at(host, Utc::now()).await
    }

    pub async fn reconcile_at(
        &self,
        host: &Host,
        now: DateTime<Utc>,
    ) -> Result<Reconciliation, StoreError> {
        let Some(mac) = host.mac else {
            // No durable identity to merge on.
            let device = Device::transient(host.hostname.clone(), host.vendor.clone(), now);
            debug!(ip = %host.ip, "no hardware address, keeping host scan-local");
            let mut report = Reconciliation::new(device.id, host.ip);
            report.persisted = false;
            return Ok(report);
        };

        let device_id = DeviceId::from_mac(mac);
        let _guard = self.lock_observation(device_id, host.ip).await?;

        let mut report = Reconciliation::new(device_id, host.ip);
        let device = self.upsert_device(host, mac, now, &mut report).await?;
        self.reconcile_leases(host, mac, &device, now, &mut report)
            .await?;
        self.upsert_services(host, &device, now, &mut report).await?;

        Ok(report)
    }

    /// Locks the observed device and IP, plus the device currently holding that IP, whose lease a
    /// conflict would release.
    async fn lock_observation(
        &self,
        device_id: DeviceId,
        ip: IpAddr,
    ) -> Result<KeyedGuard, StoreError> {
        let mut holder = self.active_holder(ip).await?;
        loop {
            let keys = [
                Some(LockKey::Device(device_id)),
                Some(LockKey::Ip(ip)),
                holder.map(LockKey::Device),
            ];
            let guard = self.locks.lock_all(keys.into_iter().flatten()).await;

            // New leases on `ip` need its lock, so the holder can only have gone away since.
            let current = self.active_holder(ip).await?;
            if current.is_none() || current == holder || current == Some(device_id) {
                return Ok(guard);
            }
            debug!(%ip, "lease holder changed while waiting, relocking");
            holder = current;
        }
    }

    async fn active_holder(&self, ip: IpAddr) -> Result<Option<DeviceId>, StoreError> {
        Ok(self
            .store
            .active_lease_by_ip(ip)
            .await?
            .map(|lease| lease.device_id))
    }

    async fn upsert_device(
        &self,
        host: &Host,
        mac: MacAddr,
        now: DateTime<Utc>,
        report: &mut Reconciliation,
    ) -> Result<Device, StoreError> {
        let id = DeviceId::from_mac(mac);
        if let Some(mut device) = self.store.get_device(id).await? {
            device.observe(host.hostname.as_deref(), host.vendor.as_deref(), now);
            self.store.save_device(&device).await?;
            return Ok(device);
        }

        let device = Device::discovered(mac, host.hostname.clone(), host.vendor.clone(), now);
        self.store.save_device(&device).await?;
        self.events.emit(Event::new_device(&device, host.ip).at(now)).await?;
        report.new_device = true;
        Ok(device)
    }

    async fn reconcile_leases(
        &self,
        host: &Host,
        mac: MacAddr,
        device: &Device,
        now: DateTime<Utc>,
        report: &mut Reconciliation,
    ) -> Result<(), StoreError> {
        let mut already_held = false;

        if let Some(lease) = self.store.active_lease_by_ip(host.ip).await? {
            if lease.device_id == device.id {
                already_held = true;
            } else {
                self.store.release_lease(lease.id, now).await?;
                self.events
                    .emit(Event::conflict(host.ip, lease.device_id, device).at(now))
                    .await?;
                report.conflict = true;
            }
        }

        for lease in self.store.leases_by_device(device.id).await? {
            if lease.is_active() && lease.ip != host.ip {
                self.store.release_lease(lease.id, now).await?;
                self.events
                    .emit(Event::ip_change(device, lease.ip, host.ip).at(now))
                    .await?;
                report.ip_changed = true;
            }
        }

        if already_held {
            return Ok(());
        }

        let lease = IpLease::acquire(device.id, host.ip, Some(mac), now);
        self.store.create_lease(&lease).await?;

        if let Some(reservation) = self.store.reservation_for_ip(host.ip).await?
            && reservation.mac != mac
        {
            self.events
                .emit(Event::reservation_violation(&reservation, device).at(now))
                .await?;
            report.reservation_violated = true;
        }

        Ok(())
    }

    async fn upsert_services(
        &self,
        host: &Host,
        device: &Device,
        now: DateTime<Utc>,
        report: &mut Reconciliation,
    ) -> Result<(), StoreError> {
        for open in &host.open_ports {
            let key = ServiceKey {
                device_id: device.id,
                ip: host.ip,
                port: open.port,
                protocol: open.protocol,
            };
            let id = self
                .store
                .get_service(&key)
                .await?
                .map(|existing| existing.id)
                .unwrap_or_else(Uuid::new_v4);

            self.store
                .save_service(&Service {
                    id,
                    device_id: device.id,
                    ip: host.ip,
                    port: open.port,
                    protocol: open.protocol,
                    kind: open.kind,
                    url: open.url.clone(),
                    title: open.title.clone(),
                    last_seen: now,
                })
                .await?;
            report.services += 1;
        }
        Ok(())
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

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use ledgr_common::inventory::{
        DeviceFilter, EventFilter, EventKind, Reservation, ServiceKind, TransportProtocol,
    };
    use ledgr_common::network::host::OpenPort;
    use ledgr_store::MemoryStore;

    fn mac(last: u8) -> MacAddr {
        MacAddr::new(0xaa, 0xbb, 0xcc, 0xdd, 0xee, last)
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn setup() -> (Arc<MemoryStore>, Reconciler) {
        let store = Arc::new(MemoryStore::new());
        let reconciler = Reconciler::new(store.clone());
        (store, reconciler)
    }

    async fn events_of(store: &MemoryStore, kind: EventKind) -> Vec<Event> {
        store
            .list_events(&EventFilter {
                kind: Some(kind),
                ..EventFilter::default()
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn first_sighting_creates_device_and_one_event() {
        let (store, reconciler) = setup();
        let host = Host::new(ip("10.0.0.5")).with_mac(mac(1)).with_vendor("Unknown");
        let now = Utc::now();

        let first = reconciler.reconcile_at(&host, now).await.unwrap();
        assert!(first.new_device);

        let device = store.get_device(first.device_id).await.unwrap().unwrap();
        assert_eq!(device.first_seen, device.last_seen);

        let second = reconciler
            .reconcile_at(&host, now + Duration::seconds(60))
            .await
            .unwrap();
        assert!(!second.new_device);
        assert!(!second.ip_changed && !second.conflict);

        let device = store.get_device(first.device_id).await.unwrap().unwrap();
        assert_eq!(device.last_seen, now + Duration::seconds(60));
        assert_eq!(events_of(&store, EventKind::NewDevice).await.len(), 1);
        assert_eq!(store.leases_by_device(device.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn moving_device_releases_old_lease_with_one_ip_change() {
        let (store, reconciler) = setup();
        reconciler
            .reconcile(&Host::new(ip("10.0.0.5")).with_mac(mac(1)))
            .await
            .unwrap();
        let moved = reconciler
            .reconcile(&Host::new(ip("10.0.0.6")).with_mac(mac(1)))
            .await
            .unwrap();
        assert!(moved.ip_changed);

        let leases = store.leases_by_device(moved.device_id).await.unwrap();
        let active: Vec<_> = leases.iter().filter(|l| l.is_active()).collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].ip, ip("10.0.0.6"));
        assert!(store.active_lease_by_ip(ip("10.0.0.5")).await.unwrap().is_none());

        let changes = events_of(&store, EventKind::IpChange).await;
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].ip, Some(ip("10.0.0.6")));
    }

    #[tokio::test]
    async fn reassigned_ip_raises_exactly_one_conflict() {
        let (store, reconciler) = setup();
        let a = reconciler
            .reconcile(&Host::new(ip("10.0.0.5")).with_mac(mac(1)))
            .await
            .unwrap();
        let b = reconciler
            .reconcile(&Host::new(ip("10.0.0.5")).with_mac(mac(2)))
            .await
            .unwrap();
        assert!(b.conflict);

        let active = store.active_lease_by_ip(ip("10.0.0.5")).await.unwrap().unwrap();
        assert_eq!(active.device_id, b.device_id);
        let a_leases = store.leases_by_device(a.device_id).await.unwrap();
        assert!(a_leases.iter().all(|l| !l.is_active()));

        let conflicts = events_of(&store, EventKind::Conflict).await;
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].ip, Some(ip("10.0.0.5")));
        assert!(conflicts[0].description.contains(&a.device_id.to_string()));
        assert!(conflicts[0].description.contains(&b.device_id.to_string()));
    }

    #[tokio::test]
    async fn events_carry_the_observation_time() {
        let (store, reconciler) = setup();
        let earlier = Utc::now() - Duration::hours(2);
        let later = earlier + Duration::minutes(5);

        reconciler
            .reconcile_at(&Host::new(ip("10.0.0.5")).with_mac(mac(1)), earlier)
            .await
            .unwrap();
        let b = reconciler
            .reconcile_at(&Host::new(ip("10.0.0.5")).with_mac(mac(2)), later)
            .await
            .unwrap();

        let created = events_of(&store, EventKind::NewDevice).await;
        assert!(created.iter().any(|e| e.timestamp == earlier));
        assert!(created.iter().any(|e| e.timestamp == later));

        let conflict = events_of(&store, EventKind::Conflict).await.remove(0);
        let released = store
            .leases_by_device(DeviceId::from_mac(mac(1)))
            .await
            .unwrap()
            .remove(0);
        assert_eq!(conflict.timestamp, later);
        assert_eq!(released.released_at, Some(later));
        assert_eq!(conflict.device_id, Some(b.device_id));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_address_swap_emits_one_change_and_one_conflict() {
        for _ in 0..25 {
            let (store, reconciler) = setup();
            let reconciler = Arc::new(reconciler);
            reconciler
                .reconcile(&Host::new(ip("10.0.0.5")).with_mac(mac(1)))
                .await
                .unwrap();
            reconciler
                .reconcile(&Host::new(ip("10.0.0.6")).with_mac(mac(2)))
                .await
                .unwrap();

            let swaps = [("10.0.0.6", mac(1)), ("10.0.0.5", mac(2))].map(|(addr, hw)| {
                let reconciler = Arc::clone(&reconciler);
                tokio::spawn(async move {
                    reconciler
                        .reconcile(&Host::new(ip(addr)).with_mac(hw))
                        .await
                        .unwrap()
                })
            });
            for swap in futures::future::join_all(swaps).await {
                swap.unwrap();
            }

            assert_eq!(events_of(&store, EventKind::IpChange).await.len(), 1);
            assert_eq!(events_of(&store, EventKind::Conflict).await.len(), 1);
            for addr in ["10.0.0.5", "10.0.0.6"] {
                assert!(store.active_lease_by_ip(ip(addr)).await.unwrap().is_some());
            }
        }
    }

    #[tokio::test]
    async fn reservation_mismatch_is_flagged_once() {
        let (store, reconciler) = setup();
        store
            .create_reservation(&Reservation::new(ip("10.0.0.10"), mac(9)))
            .await
            .unwrap();
        let host = Host::new(ip("10.0.0.10")).with_mac(mac(1));

        let first = reconciler.reconcile(&host).await.unwrap();
        assert!(first.reservation_violated);
        let again = reconciler.reconcile(&host).await.unwrap();
        assert!(!again.reservation_violated);

        let conflicts = events_of(&store, EventKind::Conflict).await;
        assert_eq!(conflicts.len(), 1);
        assert!(conflicts[0].title.contains("Reservation"));
    }

    #[tokio::test]
    async fn matching_reservation_is_silent() {
        let (store, reconciler) = setup();
        store
            .create_reservation(&Reservation::new(ip("10.0.0.10"), mac(1)))
            .await
            .unwrap();
        let report = reconciler
            .reconcile(&Host::new(ip("10.0.0.10")).with_mac(mac(1)))
            .await
            .unwrap();
        assert!(!report.reservation_violated);
        assert!(events_of(&store, EventKind::Conflict).await.is_empty());
    }

    #[tokio::test]
    async fn services_are_upserted_not_duplicated() {
        let (store, reconciler) = setup();
        let port = |title: &str| OpenPort {
            port: 80,
            protocol: TransportProtocol::Tcp,
            kind: ServiceKind::Http,
            url: Some("http://10.0.0.5:80".into()),
            title: Some(title.into()),
        };

        let first = reconciler
            .reconcile(&Host::new(ip("10.0.0.5")).with_mac(mac(1)).with_port(port("Login")))
            .await
            .unwrap();
        let before = store.services_by_device(first.device_id).await.unwrap();

        reconciler
            .reconcile(&Host::new(ip("10.0.0.5")).with_mac(mac(1)).with_port(port("Dashboard")))
            .await
            .unwrap();
        let after = store.services_by_device(first.device_id).await.unwrap();

        assert_eq!(after.len(), 1);
        assert_eq!(after[0].id, before[0].id);
        assert_eq!(after[0].title.as_deref(), Some("Dashboard"));
    }

    #[tokio::test]
    async fn hosts_without_mac_are_not_persisted() {
        let (store, reconciler) = setup();
        let report = reconciler
            .reconcile(&Host::new(ip("10.0.0.5")).with_hostname("printer"))
            .await
            .unwrap();

        assert!(!report.persisted);
        assert!(store.list_devices(&DeviceFilter::default()).await.unwrap().is_empty());
        assert!(store.active_lease_by_ip(ip("10.0.0.5")).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_sightings_of_one_mac_create_one_device() {
        let (store, reconciler) = setup();
        let reconciler = Arc::new(reconciler);

        let mut tasks = Vec::new();
        for _ in 0..20 {
            let reconciler = Arc::clone(&reconciler);
            tasks.push(tokio::spawn(async move {
                reconciler
                    .reconcile(&Host::new(ip("10.0.0.5")).with_mac(mac(1)))
                    .await
                    .unwrap()
            }));
        }
        let reports: Vec<Reconciliation> = futures::future::join_all(tasks)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        assert_eq!(reports.iter().filter(|r| r.new_device).count(), 1);
        assert_eq!(store.list_devices(&DeviceFilter::default()).await.unwrap().len(), 1);
        assert_eq!(events_of(&store, EventKind::NewDevice).await.len(), 1);
        assert_eq!(store.leases_by_device(reports[0].device_id).await.unwrap().len(), 1);
    }
}
