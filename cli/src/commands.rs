pub mod events;
pub mod inventory;
pub mod reservations;
pub mod scan;
pub mod watch;

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use uuid::Uuid;

use ledgr_common::config::Config;
use ledgr_common::inventory::{DeviceId, EventKind, InventoryRepository};
use ledgr_common::network::mac::{self, MacAddr};
use ledgr_common::network::range::Subnet;

#[derive(Parser)]
#[command(name = "ledgr")]
#[command(about = "Network discovery and asset inventory.")]
#[command(version)]
pub struct CommandLine {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
    /// Keep the inventory in memory instead of the configured database
    #[arg(long, global = true)]
    pub in_memory: bool,
    /// Print results as JSON on stdout
    #[arg(long, global = true)]
    pub json: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Discover hosts in one or more ranges and reconcile them into the inventory
    #[command(alias = "s")]
    Scan {
        #[arg(required = true)]
        subnets: Vec<Subnet>,
        /// Skip the service checks
        #[arg(long)]
        no_ports: bool,
        /// Maximum number of addresses probed at once
        #[arg(short, long)]
        window: Option<usize>,
    },
    /// Rescan ranges on a fixed interval until interrupted
    #[command(alias = "w")]
    Watch {
        /// Defaults to the configured subnets
        subnets: Vec<Subnet>,
        /// Seconds between scans
        #[arg(short, long)]
        interval: Option<u64>,
        #[arg(long)]
        no_ports: bool,
    },
    /// List known devices
    #[command(alias = "d")]
    Devices {
        #[arg(long)]
        vendor: Option<String>,
        #[arg(long)]
        hostname: Option<String>,
    },
    /// Show the address history of a device
    Leases {
        device: DeviceId,
        /// Only leases of this address
        #[arg(long)]
        ip: Option<IpAddr>,
    },
    /// Show the services a device exposes
    Services { device: DeviceId },
    /// List recorded events, unacknowledged ones by default
    #[command(alias = "e")]
    Events {
        #[arg(short, long)]
        kind: Option<EventKind>,
        /// Include acknowledged events
        #[arg(short, long)]
        all: bool,
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Acknowledge an event
    Ack { event: Uuid },
    /// Reserve an address for a hardware address
    Reserve {
        ip: IpAddr,
        #[arg(value_parser = parse_mac)]
        mac: MacAddr,
        #[arg(long)]
        hostname: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// List reservations
    Reservations,
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

fn parse_mac(s: &str) -> Result<MacAddr, String> {
    mac::parse_lenient(s).ok_or_else(|| format!("invalid MAC address: {s}"))
}

/// What every command runs against.
pub struct App {
    pub config: Config,
    pub store: Arc<dyn InventoryRepository>,
    pub json: bool,
}
