//! # Address Range Model
//!
//! Inclusive IPv4 ranges and the validated [`Subnet`] (CIDR block) that scans are driven by.
//!
//! A [`Subnet`] is the only range type that crosses the scan boundary: parsing it is the
//! validation step, so a malformed range is rejected before any probe is scheduled.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use pnet::ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};

use crate::error::ScanError;

/// Represents a continuous range of IPv4 addresses, inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Range {
    pub start_addr: Ipv4Addr,
    pub end_addr: Ipv4Addr,
}

impl Ipv4Range {
    pub fn new(start_addr: Ipv4Addr, end_addr: Ipv4Addr) -> Self {
        Self {
            start_addr,
            end_addr,
        }
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = Ipv4Addr> + Clone + use<> {
        let start: u32 = u32::from(self.start_addr);
        let end: u32 = u32::from(self.end_addr);
        (start..=end).map(Ipv4Addr::from)
    }

    pub fn len(&self) -> usize {
        let start: u32 = u32::from(self.start_addr);
        let end: u32 = u32::from(self.end_addr);
        if start > end {
            0
        } else {
            (end - start) as usize + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Merges overlapping or adjacent ranges into a sorted list of disjoint ones.
///
/// Iterating the result visits every address of the inputs exactly once.
pub fn merge_ranges(ranges: impl IntoIterator<Item = Ipv4Range>) -> Vec<Ipv4Range> {
    let mut bounds: Vec<(u32, u32)> = ranges
        .into_iter()
        .filter(|range| !range.is_empty())
        .map(|range| (u32::from(range.start_addr), u32::from(range.end_addr)))
        .collect();
    bounds.sort_unstable();

    let mut merged: Vec<(u32, u32)> = Vec::with_capacity(bounds.len());
    for (start, end) in bounds {
        match merged.last_mut() {
            Some(last) if start <= last.1.saturating_add(1) => last.1 = last.1.max(end),
            _ => merged.push((start, end)),
        }
    }

    merged
        .into_iter()
        .map(|(start, end)| Ipv4Range::new(Ipv4Addr::from(start), Ipv4Addr::from(end)))
        .collect()
}

/// Smallest accepted prefix; a /16 is already 65 534 probes.
pub const MIN_PREFIX: u8 = 16;

/// A validated IPv4 CIDR block, e.g. `192.168.1.0/24`.
///
/// Host bits of the base address are masked off, so `192.168.1.7/24` and
/// `192.168.1.0/24` are the same subnet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Subnet {
    network: Ipv4Network,
}

impl Subnet {
    pub fn new(ip: Ipv4Addr, prefix: u8) -> Result<Self, ScanError> {
        if prefix < MIN_PREFIX {
            return Err(ScanError::Validation {
                input: format!("{ip}/{prefix}"),
                reason: format!("prefix /{prefix} is wider than /{MIN_PREFIX}"),
            });
        }
        let raw = Ipv4Network::new(ip, prefix).map_err(|e| ScanError::Validation {
            input: format!("{ip}/{prefix}"),
            reason: e.to_string(),
        })?;
        // Re-anchor on the network address so equality ignores host bits.
        let network = Ipv4Network::new(raw.network(), prefix).map_err(|e| ScanError::Validation {
            input: format!("{ip}/{prefix}"),
            reason: e.to_string(),
        })?;
        Ok(Self { network })
    }

    pub fn network_addr(&self) -> Ipv4Addr {
        self.network.network()
    }

    pub fn broadcast_addr(&self) -> Ipv4Addr {
        self.network.broadcast()
    }

    pub fn prefix(&self) -> u8 {
        self.network.prefix()
    }

    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        self.network.contains(ip)
    }

    /// The addresses a scan should probe.
    ///
    /// Network and broadcast addresses are excluded, which yields `2^(32 - p) - 2` hosts.
    /// /31 and /32 blocks have no such pair to strip and are returned whole.
    pub fn usable_hosts(&self) -> Ipv4Range {
        let network: u32 = u32::from(self.network_addr());
        let broadcast: u32 = u32::from(self.broadcast_addr());

        if self.prefix() >= 31 {
            return Ipv4Range::new(Ipv4Addr::from(network), Ipv4Addr::from(broadcast));
        }

        Ipv4Range::new(
            Ipv4Addr::from(network.saturating_add(1)),
            Ipv4Addr::from(broadcast.saturating_sub(1)),
        )
    }

    pub fn usable_count(&self) -> usize {
        self.usable_hosts().len()
    }
}

impl fmt::Display for Subnet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network_addr(), self.prefix())
    }
}

impl FromStr for Subnet {
    type Err = ScanError;

    /// Parses CIDR notation like "192.168.1.0/24".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = |reason: String| ScanError::Validation {
            input: s.to_string(),
            reason,
        };

        let (ip_str, prefix_str) = s
            .split_once('/')
            .ok_or_else(|| invalid("expected <address>/<prefix>".to_string()))?;

        let ip = ip_str
            .parse::<Ipv4Addr>()
            .map_err(|e| invalid(format!("invalid IP '{ip_str}': {e}")))?;

        let prefix = prefix_str
            .parse::<u8>()
            .map_err(|e| invalid(format!("invalid prefix '{prefix_str}': {e}")))?;

        if prefix > 32 {
            return Err(invalid(format!("prefix {prefix} > 32")));
        }

        Self::new(ip, prefix)
    }
}

impl TryFrom<String> for Subnet {
    type Error = ScanError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Subnet> for String {
    fn from(value: Subnet) -> Self {
        value.to_string()
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
