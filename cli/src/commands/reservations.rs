use std::net::IpAddr;

use tracing::info;

use ledgr_common::inventory::Reservation;
use ledgr_common::network::mac::MacAddr;

use crate::commands::App;
use crate::terminal::{format, print};

pub async fn reserve(
    app: &App,
    ip: IpAddr,
    mac: MacAddr,
    hostname: Option<String>,
    notes: Option<String>,
) -> anyhow::Result<()> {
    let mut reservation = Reservation::new(ip, mac);
    reservation.hostname = hostname;
    reservation.notes = notes;
    app.store.create_reservation(&reservation).await?;

    if app.json {
        return print::json(&reservation);
    }
    info!(%ip, %mac, "address reserved");
    Ok(())
}

pub async fn list(app: &App) -> anyhow::Result<()> {
    let reservations = app.store.list_reservations().await?;

    if app.json {
        return print::json(&reservations);
    }
    print::header("reservations");
    if reservations.is_empty() {
        print::no_results();
    }
    for (idx, reservation) in reservations.iter().enumerate() {
        print::tree_head(idx, &reservation.ip.to_string());
        print::as_tree_one_level(format::reservation_details(reservation));
    }
    print::end_of_program();
    Ok(())
}
