use std::sync::Arc;

use tracing::info;

use ledgr_common::error::StoreError;
use ledgr_common::inventory::{Event, InventoryRepository};

/// Appends events to the inventory. No deduplication: each call is one record.
#[derive(Clone)]
pub struct EventEmitter {
    store: Arc<dyn InventoryRepository>,
}

impl EventEmitter {
    pub fn new(store: Arc<dyn InventoryRepository>) -> Self {
        Self { store }
    }

    pub async fn emit(&self, event: Event) -> Result<Event, StoreError> {
        self.store.create_event(&event).await?;
        info!(
            kind = %event.kind,
            ip = ?event.ip,
            device = ?event.device_id.map(|id| id.to_string()),
            "{}",
            event.title
        );
        Ok(event)
    }
}
