//! # Neighbor Table Snapshot
//!
//! Reads the operating system's address-resolution cache once per scan. Nothing is sent on the
//! wire: a host only shows up here if the kernel already talked to it (the reachability probe
//! usually takes care of that for hosts on the local segment).

use std::net::Ipv4Addr;
use std::sync::OnceLock;

use anyhow::{Context, ensure};
use async_trait::async_trait;
use regex::Regex;
use tokio::process::Command;

use ledgr_common::network::mac;
use ledgr_common::network::neighbors::ArpTable;
use ledgr_common::scanning::NeighborTable;

const PROC_NET_ARP: &str = "/proc/net/arp";
/// Kernel flag value of an entry that never resolved.
const INCOMPLETE_FLAGS: &str = "0x0";

static ARP_AN_RE: OnceLock<Regex> = OnceLock::new();

fn arp_an_regex() -> &'static Regex {
    ARP_AN_RE.get_or_init(|| {
        Regex::new(r"\((\d{1,3}(?:\.\d{1,3}){3})\) at ([0-9A-Fa-f]{1,2}(?:[:-][0-9A-Fa-f]{1,2}){5})")
            .expect("arp pattern is a valid regex")
    })
}

/// The platform's own table: `/proc/net/arp` on Linux, `arp -an` elsewhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemArpTable;

#[async_trait]
impl NeighborTable for SystemArpTable {
    async fn snapshot(&self) -> anyhow::Result<ArpTable> {
        if cfg!(target_os = "linux") {
            let contents = tokio::fs::read_to_string(PROC_NET_ARP)
                .await
                .with_context(|| format!("failed to read {PROC_NET_ARP}"))?;
            return Ok(parse_proc_net_arp(&contents));
        }

        let output = Command::new("arp")
            .arg("-an")
            .kill_on_drop(true)
            .output()
            .await
            .context("failed to run `arp -an`")?;
        ensure!(output.status.success(), "`arp -an` exited with {}", output.status);
        Ok(parse_arp_an(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Parses the Linux table:
///
/// ```text
/// IP address       HW type     Flags       HW address            Mask     Device
/// 192.168.1.1      0x1         0x2         a4:91:b1:0c:22:7e     *        wlan0
/// ```
pub fn parse_proc_net_arp(contents: &str) -> ArpTable {
    contents
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            let [ip, _hw_type, flags, hw_addr, ..] = fields.as_slice() else {
                return None;
            };
            if *flags == INCOMPLETE_FLAGS {
                return None;
            }
            let ip: Ipv4Addr = ip.parse().ok()?;
            let mac = mac::parse_lenient(hw_addr)?;
            Some((ip, mac))
        })
        .collect()
}

/// Parses BSD-style `arp -an` output:
///
/// ```text
/// ? (192.168.1.1) at a4:91:b1:c:22:7e on en0 ifscope [ethernet]
/// ? (192.168.1.7) at (incomplete) on en0 ifscope [ethernet]
/// ```
pub fn parse_arp_an(output: &str) -> ArpTable {
    output
        .lines()
        .filter_map(|line| {
            let caps = arp_an_regex().captures(line)?;
            let ip: Ipv4Addr = caps.get(1)?.as_str().parse().ok()?;
            let mac = mac::parse_lenient(caps.get(2)?.as_str())?;
            Some((ip, mac))
        })
        .collect()
}
