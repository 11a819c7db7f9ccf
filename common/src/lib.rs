//! # ledgr common
//!
//! Types shared by every crate in the workspace.
//!
//! * **[`inventory`]**: persisted models and the [`inventory::InventoryRepository`] gateway.
//! * **[`network`]**: observed hosts, MAC helpers, CIDR ranges and the neighbor table snapshot.
//! * **[`scanning`]**: the per-scan context and the prober/neighbor-table contracts.
//! * **[`vendors`]**: the vendor lookup contract.
//! * **[`config`]**, **[`error`]**, **[`utils`]**.

pub mod config;
pub mod error;
pub mod inventory;
pub mod network;
pub mod scanning;
pub mod utils;
pub mod vendors;
