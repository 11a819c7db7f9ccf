//! Network value objects shared by the scanner and the inventory.

pub mod host;
pub mod mac;
pub mod neighbors;
pub mod range;
