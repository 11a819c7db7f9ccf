use std::sync::Arc;

use colored::*;
use tracing::Instrument;

use ledgr_common::network::range::Subnet;
use ledgr_core::discovery::{DiscoveryService, ScanSummary};

use crate::commands::App;
use crate::terminal::{colors, format, print, spinner};

pub async fn scan(
    app: &App,
    subnets: Vec<Subnet>,
    no_ports: bool,
    window: Option<usize>,
) -> anyhow::Result<()> {
    let mut config = app.config.clone();
    if let Some(window) = window {
        config.scan.window = window;
    }
    let port_scan = config.scan.port_scan && !no_ports;
    let service = DiscoveryService::from_config(Arc::clone(&app.store), &config)?;

    let span = spinner::scan_span(&subnets);
    let ticket = service.perform_scan(subnets, port_scan)?;
    let summary = ticket.wait().instrument(span).await?;

    if app.json {
        return print::json(&summary);
    }
    print_summary(&summary);
    Ok(())
}

pub fn print_summary(summary: &ScanSummary) {
    print::header("discovered hosts");
    if summary.hosts.is_empty() {
        print::no_results();
    }
    for (idx, host) in summary.hosts.iter().enumerate() {
        print::tree_head(idx, &format::host_name(host));
        print::as_tree_one_level(format::host_details(host));
    }

    print::header("summary");
    let ranges = summary
        .subnets
        .iter()
        .map(|subnet| subnet.to_string())
        .collect::<Vec<String>>()
        .join(", ");
    print::aligned_line("Ranges", ranges);
    print::aligned_line("Probed", summary.probed.to_string());
    print::aligned_line(
        "Reachable",
        summary.reachable.to_string().color(colors::ACCENT),
    );
    if summary.transient > 0 {
        print::aligned_line("No MAC", summary.transient.to_string());
    }
    print::aligned_line("New", count(summary.new_devices, colors::EVENT_NEW));
    print::aligned_line("IP changes", count(summary.ip_changes, colors::EVENT_CHANGE));
    print::aligned_line(
        "Conflicts",
        count(
            summary.conflicts + summary.reservation_violations,
            colors::EVENT_CONFLICT,
        ),
    );
    print::aligned_line("Services", summary.services.to_string());
    if summary.failed_tasks + summary.persistence_errors > 0 {
        print::aligned_line(
            "Failures",
            (summary.failed_tasks + summary.persistence_errors)
                .to_string()
                .red(),
        );
    }
    let elapsed = summary.finished_at - summary.started_at;
    print::aligned_line(
        "Took",
        format!("{:.2}s", elapsed.num_milliseconds() as f64 / 1000.0),
    );
    print::end_of_program();
}

fn count(n: usize, color: Color) -> ColoredString {
    if n == 0 {
        n.to_string().normal()
    } else {
        n.to_string().color(color).bold()
    }
}
