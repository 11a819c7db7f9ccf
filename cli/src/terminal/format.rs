//! Key/value renderings of inventory records for [`print::as_tree_one_level`].
//!
//! [`print::as_tree_one_level`]: crate::terminal::print::as_tree_one_level

use chrono::{DateTime, Local, Utc};
use colored::*;

use ledgr_common::inventory::{
    Device, Event, EventKind, IpLease, Reservation, Service, device_label,
};
use ledgr_common::network::host::Host;
use ledgr_common::network::mac::MacAddr;

use crate::terminal::colors;

type Pairs = Vec<(String, ColoredString)>;

fn pair(key: &str, value: ColoredString) -> (String, ColoredString) {
    (key.to_string(), value)
}

pub fn timestamp(ts: DateTime<Utc>) -> ColoredString {
    ts.with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
        .color(colors::TIMESTAMP)
}

fn mac(mac: MacAddr) -> ColoredString {
    mac.to_string().color(colors::MAC_ADDR)
}

pub fn host_details(host: &Host) -> Pairs {
    let mut pairs = Vec::new();
    pairs.push(pair("ip", host.ip.to_string().color(colors::IPV4_ADDR)));
    if let Some(m) = host.mac {
        pairs.push(pair("mac", mac(m)));
    }
    if let Some(vendor) = &host.vendor {
        pairs.push(pair("vendor", vendor.color(colors::VENDOR)));
    }
    for port in &host.open_ports {
        let label = port
            .url
            .clone()
            .or_else(|| port.title.clone())
            .unwrap_or_default();
        pairs.push(pair(
            &format!("{}/{}", port.port, port.protocol),
            format!("{} {}", port.kind, label).color(colors::SERVICE),
        ));
    }
    pairs
}

pub fn host_name(host: &Host) -> String {
    host.hostname.clone().unwrap_or_else(|| host.ip.to_string())
}

pub fn device_details(device: &Device) -> Pairs {
    let mut pairs = vec![pair("id", device.id.to_string().normal())];
    if let Some(m) = device.mac {
        pairs.push(pair("mac", mac(m)));
    }
    if let Some(vendor) = &device.vendor {
        pairs.push(pair("vendor", vendor.color(colors::VENDOR)));
    }
    pairs.push(pair("first", timestamp(device.first_seen)));
    pairs.push(pair("last", timestamp(device.last_seen)));
    pairs
}

pub fn device_name(device: &Device) -> String {
    device_label(device)
}

pub fn lease_details(lease: &IpLease) -> Pairs {
    let mut pairs = vec![pair("acquired", timestamp(lease.acquired_at))];
    match lease.released_at {
        Some(at) => pairs.push(pair("released", timestamp(at))),
        None => pairs.push(pair("released", "active".green())),
    }
    pairs
}

pub fn service_details(service: &Service) -> Pairs {
    let mut pairs = vec![
        pair("ip", service.ip.to_string().color(colors::IPV4_ADDR)),
        pair("kind", service.kind.as_str().color(colors::SERVICE)),
    ];
    if let Some(url) = &service.url {
        pairs.push(pair("url", url.normal()));
    }
    if let Some(title) = &service.title {
        pairs.push(pair("title", title.italic()));
    }
    pairs.push(pair("last", timestamp(service.last_seen)));
    pairs
}

pub fn event_kind(kind: EventKind) -> ColoredString {
    let color = match kind {
        EventKind::NewDevice => colors::EVENT_NEW,
        EventKind::IpChange => colors::EVENT_CHANGE,
        EventKind::Conflict | EventKind::ServiceDown => colors::EVENT_CONFLICT,
    };
    kind.as_str().color(color).bold()
}

pub fn event_details(event: &Event) -> Pairs {
    let mut pairs = vec![
        pair("id", event.id.to_string().normal()),
        pair("kind", event_kind(event.kind)),
        pair("at", timestamp(event.timestamp)),
    ];
    if let Some(ip) = event.ip {
        pairs.push(pair("ip", ip.to_string().color(colors::IPV4_ADDR)));
    }
    if let Some(m) = event.mac {
        pairs.push(pair("mac", mac(m)));
    }
    pairs.push(pair("details", event.description.normal()));
    if event.acknowledged {
        pairs.push(pair("acked", "yes".dimmed()));
    }
    pairs
}

pub fn reservation_details(reservation: &Reservation) -> Pairs {
    let mut pairs = vec![pair("mac", mac(reservation.mac))];
    if let Some(hostname) = &reservation.hostname {
        pairs.push(pair("hostname", hostname.normal()));
    }
    if let Some(notes) = &reservation.notes {
        pairs.push(pair("notes", notes.italic()));
    }
    pairs
}
