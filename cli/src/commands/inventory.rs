use std::net::IpAddr;

use anyhow::Context;

use ledgr_common::inventory::{DeviceFilter, DeviceId};

use crate::commands::App;
use crate::terminal::{format, print};

pub async fn devices(app: &App, vendor: Option<String>, hostname: Option<String>) -> anyhow::Result<()> {
    let filter = DeviceFilter {
        vendor,
        hostname,
        ..DeviceFilter::default()
    };
    let devices = app.store.list_devices(&filter).await?;

    if app.json {
        return print::json(&devices);
    }
    print::header("devices");
    if devices.is_empty() {
        print::no_results();
    }
    for (idx, device) in devices.iter().enumerate() {
        print::tree_head(idx, &format::device_name(device));
        print::as_tree_one_level(format::device_details(device));
    }
    print::end_of_program();
    Ok(())
}

pub async fn leases(app: &App, device: DeviceId, ip: Option<IpAddr>) -> anyhow::Result<()> {
    ensure_device(app, device).await?;
    let mut leases = app.store.leases_by_device(device).await?;
    if let Some(ip) = ip {
        leases.retain(|lease| lease.ip == ip);
    }

    if app.json {
        return print::json(&leases);
    }
    print::header("lease history");
    if leases.is_empty() {
        print::no_results();
    }
    for (idx, lease) in leases.iter().enumerate() {
        print::tree_head(idx, &lease.ip.to_string());
        print::as_tree_one_level(format::lease_details(lease));
    }
    print::end_of_program();
    Ok(())
}

pub async fn services(app: &App, device: DeviceId) -> anyhow::Result<()> {
    ensure_device(app, device).await?;
    let services = app.store.services_by_device(device).await?;

    if app.json {
        return print::json(&services);
    }
    print::header("services");
    if services.is_empty() {
        print::no_results();
    }
    for (idx, service) in services.iter().enumerate() {
        print::tree_head(idx, &format!("{}/{}", service.port, service.protocol));
        print::as_tree_one_level(format::service_details(service));
    }
    print::end_of_program();
    Ok(())
}

async fn ensure_device(app: &App, device: DeviceId) -> anyhow::Result<()> {
    app.store
        .get_device(device)
        .await?
        .map(|_| ())
        .with_context(|| format!("no device with id {device}"))
}
