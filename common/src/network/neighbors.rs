use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};

use crate::error::ResolutionError;
use crate::network::mac::{self, MacAddr};

/// Snapshot of the platform's address-resolution table (IP → MAC).
///
/// Built once at scan start and shared read-only by every probe task of that scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArpTable {
    entries: HashMap<Ipv4Addr, MacAddr>,
}

impl ArpTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry; unusable hardware addresses are ignored.
    pub fn insert(&mut self, ip: Ipv4Addr, mac: MacAddr) {
        if mac::is_assignable(mac) {
            self.entries.insert(ip, mac);
        }
    }

    pub fn lookup(&self, ip: IpAddr) -> Result<MacAddr, ResolutionError> {
        let IpAddr::V4(v4) = ip else {
            return Err(ResolutionError::NoNeighborEntry(ip));
        };
        self.entries
            .get(&v4)
            .copied()
            .ok_or(ResolutionError::NoNeighborEntry(ip))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(Ipv4Addr, MacAddr)> for ArpTable {
    fn from_iter<T: IntoIterator<Item = (Ipv4Addr, MacAddr)>>(iter: T) -> Self {
        let mut table = ArpTable::new();
        for (ip, mac) in iter {
            table.insert(ip, mac);
        }
        table
    }
}
