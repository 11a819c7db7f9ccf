//! Network-facing adapters used by the host resolver.

pub mod arp;
pub mod dns;
pub mod reachability;
pub mod tcp;
