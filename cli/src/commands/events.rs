use uuid::Uuid;

use ledgr_common::inventory::{EventFilter, EventKind};

use crate::commands::App;
use crate::terminal::{format, print};

pub async fn list(
    app: &App,
    kind: Option<EventKind>,
    all: bool,
    limit: Option<usize>,
) -> anyhow::Result<()> {
    let filter = EventFilter {
        kind,
        acknowledged: (!all).then_some(false),
        limit,
        ..EventFilter::default()
    };
    let events = app.store.list_events(&filter).await?;

    if app.json {
        return print::json(&events);
    }
    print::header("events");
    if events.is_empty() {
        print::no_results();
    }
    for (idx, event) in events.iter().enumerate() {
        print::tree_head(idx, &event.title);
        print::as_tree_one_level(format::event_details(event));
    }
    print::end_of_program();
    Ok(())
}

pub async fn acknowledge(app: &App, id: Uuid) -> anyhow::Result<()> {
    let event = app.store.acknowledge_event(id).await?;

    if app.json {
        return print::json(&event);
    }
    print::print_status(format!("acknowledged {} ({})", event.id, format::event_kind(event.kind)));
    Ok(())
}
