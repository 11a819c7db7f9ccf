mod commands;
mod terminal;

use std::sync::Arc;

use anyhow::Context;
use tracing::debug;

use commands::{App, CommandLine, Commands, events, inventory, reservations, scan, watch};
use ledgr_common::config::Config;
use ledgr_common::inventory::InventoryRepository;
use ledgr_store::{MemoryStore, SqliteStore};
use terminal::{logging, print};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let commands = CommandLine::parse_args();

    logging::init_logging()?;

    let config = match &commands.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let store: Arc<dyn InventoryRepository> = if commands.in_memory {
        Arc::new(MemoryStore::new())
    } else {
        let path = &config.store.path;
        debug!(path = %path.display(), "opening inventory");
        Arc::new(
            SqliteStore::open(path)
                .with_context(|| format!("failed to open inventory at {}", path.display()))?,
        )
    };

    let app = App {
        config,
        store,
        json: commands.json,
    };
    if !app.json {
        print::banner();
    }

    match commands.command {
        Commands::Scan {
            subnets,
            no_ports,
            window,
        } => scan::scan(&app, subnets, no_ports, window).await,
        Commands::Watch {
            subnets,
            interval,
            no_ports,
        } => watch::watch(&app, subnets, interval, no_ports).await,
        Commands::Devices { vendor, hostname } => inventory::devices(&app, vendor, hostname).await,
        Commands::Leases { device, ip } => inventory::leases(&app, device, ip).await,
        Commands::Services { device } => inventory::services(&app, device).await,
        Commands::Events { kind, all, limit } => events::list(&app, kind, all, limit).await,
        Commands::Ack { event } => events::acknowledge(&app, event).await,
        Commands::Reserve {
            ip,
            mac,
            hostname,
            notes,
        } => reservations::reserve(&app, ip, mac, hostname, notes).await,
        Commands::Reservations => reservations::list(&app).await,
    }
}
