use std::net::IpAddr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StoreError;
use crate::inventory::models::{
    Device, DeviceFilter, DeviceId, Event, EventFilter, IpLease, Reservation, Service, ServiceKey,
};

/// Defines the contract for the persisted inventory (the "persistence gateway").
///
/// Implementations provide per-call consistency only. Callers that need several calls to
/// behave atomically must serialize them themselves (the reconciler does, per device and IP).
#[async_trait]
pub trait InventoryRepository: Send + Sync {
    /// Inserts the device or replaces the stored row with the same identifier.
    async fn save_device(&self, device: &Device) -> Result<(), StoreError>;
    async fn get_device(&self, id: DeviceId) -> Result<Option<Device>, StoreError>;
    async fn list_devices(&self, filter: &DeviceFilter) -> Result<Vec<Device>, StoreError>;

    /// Inserts the service or updates the row sharing its [`ServiceKey`].
    async fn save_service(&self, service: &Service) -> Result<(), StoreError>;
    async fn get_service(&self, key: &ServiceKey) -> Result<Option<Service>, StoreError>;
    async fn services_by_device(&self, id: DeviceId) -> Result<Vec<Service>, StoreError>;

    /// Records a new lease.
    ///
    /// # Errors
    /// * [`StoreError::ActiveLeaseExists`] - if `lease` is active and the IP already has an
    ///   active lease.
    async fn create_lease(&self, lease: &IpLease) -> Result<(), StoreError>;
    async fn leases_by_device(&self, id: DeviceId) -> Result<Vec<IpLease>, StoreError>;
    async fn active_lease_by_ip(&self, ip: IpAddr) -> Result<Option<IpLease>, StoreError>;
    /// Sets the release timestamp of an active lease. Releasing twice is a no-op.
    async fn release_lease(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError>;

    async fn create_reservation(&self, reservation: &Reservation) -> Result<(), StoreError>;
    async fn list_reservations(&self) -> Result<Vec<Reservation>, StoreError>;
    async fn reservation_for_ip(&self, ip: IpAddr) -> Result<Option<Reservation>, StoreError>;

    async fn create_event(&self, event: &Event) -> Result<(), StoreError>;
    async fn get_event(&self, id: Uuid) -> Result<Option<Event>, StoreError>;
    /// Flips the acknowledged flag and returns the updated event.
    async fn acknowledge_event(&self, id: Uuid) -> Result<Event, StoreError>;
    /// Lists matching events, newest first.
    async fn list_events(&self, filter: &EventFilter) -> Result<Vec<Event>, StoreError>;
}
