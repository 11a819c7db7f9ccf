//! # Inventory Stores
//!
//! Implementations of [`ledgr_common::inventory::InventoryRepository`].
//!
//! * [`MemoryStore`]: process-local tables, used for one-off scans and tests.
//! * [`SqliteStore`]: a single SQLite file that keeps the inventory between runs.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
