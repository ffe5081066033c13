use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::audit::ChangeRecord;
use crate::models::{InventorySource, OrderStatus, RelationshipKind};

/// Handle used by services and commands to publish domain events.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Creates a bounded event channel, returning the sender half and the
    /// receiver to hand to [`process_events`] or a custom consumer.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self::new(tx), rx)
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

// Define the various events that can occur in the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Order events
    OrderCreated(Uuid),
    OrderUpdated(Uuid),
    OrderCancelled(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: OrderStatus,
        new_status: OrderStatus,
    },
    OrdersBatchUpdated {
        order_ids: Vec<Uuid>,
    },

    // Inventory events
    InventoryReserved {
        batch_id: Uuid,
        source: InventorySource,
        quantity: i32,
        remaining: i32,
    },
    InventoryReleased {
        batch_id: Uuid,
        source: InventorySource,
        quantity: i32,
        remaining: i32,
    },
    MortalityRecorded {
        batch_id: Uuid,
        quantity: i32,
        remaining: i32,
    },

    // Processing events
    BatchProcessed {
        source_batch_id: Uuid,
        dressed_batch_id: Uuid,
        quantity: i32,
        kind: RelationshipKind,
    },
    LiveBatchSplit {
        source_batch_id: Uuid,
        remainder_batch_id: Uuid,
        quantity: i32,
    },

    // Audit trail
    ChangeRecorded(ChangeRecord),
}

/// Drains the event channel, logging each event. Embedders that persist the
/// audit trail or fan events out to other systems replace this loop with
/// their own consumer.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::ChangeRecorded(record) => {
                info!(
                    entity_id = %record.entity_id,
                    entity_kind = %record.entity_kind,
                    fields = record.changed_fields.len(),
                    "Change recorded"
                );
            }
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => {
                info!(
                    order_id = %order_id,
                    old_status = %old_status,
                    new_status = %new_status,
                    "Order status changed"
                );
            }
            other => {
                info!("Received event: {:?}", other);
            }
        }
    }

    warn!("Event channel closed; stopping event processing loop");
}
