//! # ledgr core
//!
//! Discovery and reconciliation.
//!
//! * **[`discovery`]**: the scan entry points ([`discovery::DiscoveryService`]).
//! * **[`scanner`]**: bounded fan-out, host resolution and port probing.
//! * **[`reconciler`]**: merging observed hosts into the inventory.
//! * **[`events`]**: the append-only event log writer.
//! * **[`network`]**, **[`vendors`]**: the adapters the scanner is built from.

pub mod discovery;
pub mod events;
pub mod network;
pub mod reconciler;
pub mod scanner;
pub mod vendors;
