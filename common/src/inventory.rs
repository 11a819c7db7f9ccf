//! # Inventory
//!
//! * [`models`]: devices, leases, services, reservations and events.
//! * [`repository`]: the [`InventoryRepository`] trait every store implements.

pub mod models;
pub mod repository;

pub use models::*;
pub use repository::InventoryRepository;
