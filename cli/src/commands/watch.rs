use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use ledgr_common::network::range::Subnet;
use ledgr_core::discovery::DiscoveryService;

use crate::commands::App;

pub async fn watch(
    app: &App,
    subnets: Vec<Subnet>,
    interval: Option<u64>,
    no_ports: bool,
) -> anyhow::Result<()> {
    let subnets = if subnets.is_empty() {
        app.config.scan.subnets.clone()
    } else {
        subnets
    };
    if subnets.is_empty() {
        anyhow::bail!("no subnets given and none configured under [scan]");
    }

    let every = interval
        .map(|secs| Duration::from_secs(secs.max(1)))
        .unwrap_or_else(|| app.config.scan.interval());
    let port_scan = app.config.scan.port_scan && !no_ports;
    let service = DiscoveryService::from_config(Arc::clone(&app.store), &app.config)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("cannot listen for Ctrl-C: {err}");
            return;
        }
        info!("interrupt received, finishing the current scan");
        on_signal.cancel();
    });

    info!(
        subnets = subnets.len(),
        every_secs = every.as_secs(),
        "watching, press Ctrl-C to stop"
    );
    service.run_periodic(subnets, port_scan, every, cancel).await;
    Ok(())
}
