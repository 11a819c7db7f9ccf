use std::collections::HashMap;
use std::net::IpAddr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use ledgr_common::error::StoreError;
use ledgr_common::inventory::{
    Device, DeviceFilter, DeviceId, Event, EventFilter, InventoryRepository, IpLease, Reservation,
    Service, ServiceKey,
};

#[derive(Debug, Default)]
struct Tables {
    devices: HashMap<DeviceId, Device>,
    services: HashMap<ServiceKey, Service>,
    leases: Vec<IpLease>,
    reservations: Vec<Reservation>,
    events: Vec<Event>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InventoryRepository for MemoryStore {
    async fn save_device(&self, device: &Device) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables.devices.insert(device.id, device.clone());
        Ok(())
    }

    async fn get_device(&self, id: DeviceId) -> Result<Option<Device>, StoreError> {
        Ok(self.tables.read().await.devices.get(&id).cloned())
    }

    async fn list_devices(&self, filter: &DeviceFilter) -> Result<Vec<Device>, StoreError> {
        let tables = self.tables.read().await;
        let mut devices: Vec<Device> = tables
            .devices
            .values()
            .filter(|device| filter.matches(device))
            .cloned()
            .collect();
        devices.sort_by_key(|device| (device.first_seen, device.id));
        Ok(devices)
    }

    async fn save_service(&self, service: &Service) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let key = service.key();
        let mut stored = service.clone();
        if let Some(existing) = tables.services.get(&key) {
            stored.id = existing.id;
        }
        tables.services.insert(key, stored);
        Ok(())
    }

    async fn get_service(&self, key: &ServiceKey) -> Result<Option<Service>, StoreError> {
        Ok(self.tables.read().await.services.get(key).cloned())
    }

    async fn services_by_device(&self, id: DeviceId) -> Result<Vec<Service>, StoreError> {
        let tables = self.tables.read().await;
        let mut services: Vec<Service> = tables
            .services
            .values()
            .filter(|service| service.device_id == id)
            .cloned()
            .collect();
        services.sort_by_key(|service| (service.ip, service.port));
        Ok(services)
    }

    async fn create_lease(&self, lease: &IpLease) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if lease.is_active()
            && tables
                .leases
                .iter()
                .any(|existing| existing.is_active() && existing.ip == lease.ip)
        {
            return Err(StoreError::ActiveLeaseExists(lease.ip));
        }
        tables.leases.push(lease.clone());
        Ok(())
    }

    async fn leases_by_device(&self, id: DeviceId) -> Result<Vec<IpLease>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .leases
            .iter()
            .filter(|lease| lease.device_id == id)
            .cloned()
            .collect())
    }

    async fn active_lease_by_ip(&self, ip: IpAddr) -> Result<Option<IpLease>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .leases
            .iter()
            .find(|lease| lease.is_active() && lease.ip == ip)
            .cloned())
    }

    async fn release_lease(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let lease = tables
            .leases
            .iter_mut()
            .find(|lease| lease.id == id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "lease",
                id: id.to_string(),
            })?;
        if lease.released_at.is_none() {
            lease.released_at = Some(at);
        }
        Ok(())
    }

    async fn create_reservation(&self, reservation: &Reservation) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables.reservations.retain(|existing| existing.ip != reservation.ip);
        tables.reservations.push(reservation.clone());
        Ok(())
    }

    async fn list_reservations(&self) -> Result<Vec<Reservation>, StoreError> {
        let mut reservations = self.tables.read().await.reservations.clone();
        reservations.sort_by_key(|reservation| reservation.ip);
        Ok(reservations)
    }

    async fn reservation_for_ip(&self, ip: IpAddr) -> Result<Option<Reservation>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .reservations
            .iter()
            .find(|reservation| reservation.ip == ip)
            .cloned())
    }

    async fn create_event(&self, event: &Event) -> Result<(), StoreError> {
        self.tables.write().await.events.push(event.clone());
        Ok(())
    }

    async fn get_event(&self, id: Uuid) -> Result<Option<Event>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.events.iter().find(|event| event.id == id).cloned())
    }

    async fn acknowledge_event(&self, id: Uuid) -> Result<Event, StoreError> {
        let mut tables = self.tables.write().await;
        let event = tables
            .events
            .iter_mut()
            .find(|event| event.id == id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "event",
                id: id.to_string(),
            })?;
        event.acknowledged = true;
        Ok(event.clone())
    }

    async fn list_events(&self, filter: &EventFilter) -> Result<Vec<Event>, StoreError> {
        let tables = self.tables.read().await;
        // Events are appended in time order.
        Ok(tables
            .events
            .iter()
            .rev()
            .filter(|event| filter.matches(event))
            .take(filter.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }
}
