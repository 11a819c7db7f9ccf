use colored::*;
use indicatif::ProgressStyle;
use tracing::{Span, info_span};
use tracing_indicatif::span_ext::IndicatifSpanExt;

use ledgr_common::network::range::{Ipv4Range, Subnet, merge_ranges};

pub fn style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.blue} {msg} {elapsed:.dim}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&[
            "▁▁▁▁▁",
            "▁▂▂▂▁",
            "▁▄▂▄▁",
            "▂▄▆▄▂",
            "▄▆█▆▄",
            "▂▄▆▄▂",
            "▁▄▂▄▁",
            "▁▂▂▂▁",
        ])
}

/// A span rendered as a spinner for as long as it is entered or instrumenting a future.
pub fn scan_span(subnets: &[Subnet]) -> Span {
    let span = info_span!("scan_progress", indicatif.pb_show = true);
    let targets: usize = merge_ranges(subnets.iter().map(Subnet::usable_hosts))
        .iter()
        .map(Ipv4Range::len)
        .sum();
    let ranges = subnets
        .iter()
        .map(|subnet| subnet.to_string())
        .collect::<Vec<String>>()
        .join(", ");
    span.pb_set_message(&format!(
        "Probing {} addresses in {}",
        targets.to_string().green().bold(),
        ranges
    ));
    span
}
