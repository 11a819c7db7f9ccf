use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use ledgr_common::inventory::{
    DeviceFilter, DeviceId, EventFilter, EventKind, InventoryRepository, Reservation, ServiceKind,
};
use ledgr_common::network::range::Subnet;
use ledgr_store::{MemoryStore, SqliteStore};

use crate::support::{FakeLan, ip, mac};

fn home() -> Vec<Subnet> {
    vec!["192.168.1.0/24".parse().unwrap()]
}

async fn events(store: &dyn InventoryRepository, kind: EventKind) -> usize {
    store
        .list_events(&EventFilter {
            kind: Some(kind),
            ..EventFilter::default()
        })
        .await
        .unwrap()
        .len()
}

#[tokio::test]
async fn first_sighting_builds_the_inventory() {
    let lan = FakeLan::new();
    lan.plug(ip(100), mac(0x01), &[80]);
    let store = Arc::new(MemoryStore::new());
    let discovery = lan.service(store.clone());

    let summary = discovery.run_scan(&home(), true).await.unwrap();

    assert_eq!(summary.probed, 254);
    assert_eq!(summary.reachable, 1);
    assert_eq!(summary.new_devices, 1);
    assert_eq!(summary.services, 1);

    let devices = store.list_devices(&DeviceFilter::default()).await.unwrap();
    assert_eq!(devices.len(), 1);
    let device = &devices[0];
    assert_eq!(device.id, DeviceId::from_mac(mac(0x01)));
    assert_eq!(device.mac, Some(mac(0x01)));
    assert_eq!(device.vendor.as_deref(), Some("Unknown"));

    let active = store
        .active_lease_by_ip(IpAddr::V4(ip(100)))
        .await
        .unwrap()
        .expect("lease for the observed address");
    assert_eq!(active.device_id, device.id);

    let services = store.services_by_device(device.id).await.unwrap();
    assert_eq!(services.len(), 1);
    assert_eq!(services[0].port, 80);
    assert_eq!(services[0].kind, ServiceKind::Http);
    assert_eq!(services[0].url.as_deref(), Some("http://192.168.1.100:80"));

    assert_eq!(events(store.as_ref(), EventKind::NewDevice).await, 1);
}

#[tokio::test]
async fn rescanning_an_unchanged_network_only_refreshes_timestamps() {
    let lan = FakeLan::new();
    lan.plug(ip(100), mac(0x01), &[80]);
    let store = Arc::new(MemoryStore::new());
    let discovery = lan.service(store.clone());

    discovery.run_scan(&home(), true).await.unwrap();
    let id = DeviceId::from_mac(mac(0x01));
    let before = store.get_device(id).await.unwrap().unwrap();
    let service_before = store.services_by_device(id).await.unwrap().remove(0);

    tokio::time::sleep(Duration::from_millis(10)).await;
    let summary = discovery.run_scan(&home(), true).await.unwrap();

    assert_eq!(summary.new_devices, 0);
    assert_eq!(summary.ip_changes, 0);
    assert_eq!(summary.conflicts, 0);

    let after = store.get_device(id).await.unwrap().unwrap();
    assert_eq!(after.first_seen, before.first_seen);
    assert!(after.last_seen > before.last_seen);

    assert_eq!(store.leases_by_device(id).await.unwrap().len(), 1);
    let services = store.services_by_device(id).await.unwrap();
    assert_eq!(services.len(), 1);
    assert_eq!(services[0].id, service_before.id);
    assert!(services[0].last_seen > service_before.last_seen);

    let all = store.list_events(&EventFilter::default()).await.unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn moving_to_a_new_address_closes_the_old_lease() {
    let lan = FakeLan::new();
    lan.plug(ip(100), mac(0x01), &[]);
    let store = Arc::new(MemoryStore::new());
    let discovery = lan.service(store.clone());
    discovery.run_scan(&home(), false).await.unwrap();

    lan.unplug(ip(100));
    lan.plug(ip(101), mac(0x01), &[]);
    let summary = discovery.run_scan(&home(), false).await.unwrap();
    assert_eq!(summary.ip_changes, 1);

    let id = DeviceId::from_mac(mac(0x01));
    let leases = store.leases_by_device(id).await.unwrap();
    assert_eq!(leases.len(), 2);
    let active: Vec<_> = leases.iter().filter(|lease| lease.is_active()).collect();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].ip, IpAddr::V4(ip(101)));
    assert!(
        store
            .active_lease_by_ip(IpAddr::V4(ip(100)))
            .await
            .unwrap()
            .is_none()
    );
    assert_eq!(events(store.as_ref(), EventKind::IpChange).await, 1);
}

#[tokio::test]
async fn a_second_device_on_a_held_address_is_a_conflict() {
    let lan = FakeLan::new();
    lan.plug(ip(100), mac(0x01), &[]);
    let store = Arc::new(MemoryStore::new());
    let discovery = lan.service(store.clone());
    discovery.run_scan(&home(), false).await.unwrap();

    lan.plug(ip(100), mac(0x02), &[]);
    let summary = discovery.run_scan(&home(), false).await.unwrap();
    assert_eq!(summary.conflicts, 1);
    assert_eq!(summary.new_devices, 1);

    let holder = store
        .active_lease_by_ip(IpAddr::V4(ip(100)))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(holder.device_id, DeviceId::from_mac(mac(0x02)));

    let previous = store
        .leases_by_device(DeviceId::from_mac(mac(0x01)))
        .await
        .unwrap();
    assert_eq!(previous.len(), 1);
    assert!(!previous[0].is_active());
    assert_eq!(events(store.as_ref(), EventKind::Conflict).await, 1);
}

#[tokio::test]
async fn foreign_device_on_a_reserved_address_is_flagged() {
    let lan = FakeLan::new();
    lan.plug(ip(50), mac(0x09), &[]);
    let store = Arc::new(MemoryStore::new());
    store
        .create_reservation(&Reservation::new(IpAddr::V4(ip(50)), mac(0x01)))
        .await
        .unwrap();
    let discovery = lan.service(store.clone());

    let summary = discovery.run_scan(&home(), false).await.unwrap();
    assert_eq!(summary.reservation_violations, 1);

    // Still held by the same device, so nothing new to report.
    let summary = discovery.run_scan(&home(), false).await.unwrap();
    assert_eq!(summary.reservation_violations, 0);
    assert_eq!(events(store.as_ref(), EventKind::Conflict).await, 1);
}

#[tokio::test]
async fn acknowledged_events_leave_the_default_listing() {
    let lan = FakeLan::new();
    lan.plug(ip(10), mac(0x01), &[]);
    lan.plug(ip(11), mac(0x02), &[]);
    let store = Arc::new(MemoryStore::new());
    lan.service(store.clone()).run_scan(&home(), false).await.unwrap();

    let pending = store.list_events(&EventFilter::unacknowledged()).await.unwrap();
    assert_eq!(pending.len(), 2);

    let acked = store.acknowledge_event(pending[0].id).await.unwrap();
    assert!(acked.acknowledged);

    let pending = store.list_events(&EventFilter::unacknowledged()).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_ne!(pending[0].id, acked.id);
}

#[tokio::test]
async fn sqlite_inventory_survives_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("inventory").join("ledgr.db");

    let lan = FakeLan::new();
    lan.plug(ip(100), mac(0x01), &[80]);
    {
        let store = Arc::new(SqliteStore::open(&path).unwrap());
        lan.service(store).run_scan(&home(), true).await.unwrap();
    }

    let store = Arc::new(SqliteStore::open(&path).unwrap());
    let id = DeviceId::from_mac(mac(0x01));
    assert!(store.get_device(id).await.unwrap().is_some());
    assert_eq!(store.services_by_device(id).await.unwrap().len(), 1);
    assert_eq!(events(store.as_ref(), EventKind::NewDevice).await, 1);

    // Same network, new process: nothing is rediscovered.
    let summary = lan.service(store.clone()).run_scan(&home(), true).await.unwrap();
    assert_eq!(summary.new_devices, 0);
    assert_eq!(store.leases_by_device(id).await.unwrap().len(), 1);
}
