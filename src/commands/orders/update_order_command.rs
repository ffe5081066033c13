use crate::{
    audit::ChangeSet,
    calc,
    commands::Command,
    errors::EngineError,
    events::Event,
    models::{CalculationMode, DomainWarning, InventorySource, Order, OrderStatus},
    EngineContext,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Edits an existing order.
///
/// Inventory follows the edit: a quantity decrease releases units, an
/// increase reserves more, and switching batch or source releases the old
/// slot and reserves the new one. Setting `status` pins it against
/// re-derivation until a later update passes `clear_status_override`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateOrderCommand {
    pub order_id: Uuid,
    pub customer_name: Option<String>,
    pub order_date: Option<DateTime<Utc>>,
    pub quantity_count: Option<i32>,
    pub unit_size: Option<Decimal>,
    pub unit_price: Option<Decimal>,
    pub amount_paid: Option<Decimal>,
    pub calculation_mode: Option<CalculationMode>,
    pub inventory_source: Option<InventorySource>,
    /// `Some(Some(id))` switches batch, `Some(None)` detaches the order from
    /// its batch.
    pub source_batch_id: Option<Option<Uuid>>,
    /// Explicitly pins the status (the documented escape hatch from
    /// derivation).
    pub status: Option<OrderStatus>,
    /// Drops a previous pin; the status is re-derived immediately.
    #[serde(default)]
    pub clear_status_override: bool,
    pub notes: Option<String>,
}

/// An updated order plus the domain warnings the edit surfaced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateOrderResult {
    pub order: Order,
    pub warnings: Vec<DomainWarning>,
}

#[async_trait::async_trait]
impl Command for UpdateOrderCommand {
    type Result = UpdateOrderResult;

    #[instrument(skip(self, ctx), fields(order_id = %self.order_id))]
    async fn execute(&self, ctx: Arc<EngineContext>) -> Result<Self::Result, EngineError> {
        if self.status.is_some() && self.clear_status_override {
            return Err(EngineError::InvalidInput(
                "Setting a status and clearing the override are mutually exclusive".to_string(),
            ));
        }

        let existing = ctx.orders.get(self.order_id).ok_or_else(|| {
            warn!(order_id = %self.order_id, "Order not found for update");
            EngineError::NotFound(format!("Order {} not found", self.order_id))
        })?;

        let mut updated = existing.clone();
        self.apply_fields(&mut updated);
        super::validate_order_record(&updated)?;

        self.settle_inventory(&ctx, &existing, &updated).await?;

        let mut warnings = Vec::new();
        if let Some(warning) = calc::refresh_order(&mut updated) {
            warnings.push(warning);
        }
        updated.updated_at = Some(Utc::now());

        ctx.orders.update(updated.clone())?;

        self.log_and_trigger_events(&ctx, &existing, &updated)
            .await?;

        Ok(UpdateOrderResult {
            order: updated,
            warnings,
        })
    }
}

impl UpdateOrderCommand {
    fn apply_fields(&self, order: &mut Order) {
        if let Some(name) = &self.customer_name {
            order.customer_name = name.clone();
        }
        if let Some(date) = self.order_date {
            order.order_date = date;
        }
        if let Some(count) = self.quantity_count {
            order.quantity_count = Some(count);
        }
        if let Some(size) = self.unit_size {
            order.unit_size = Some(size);
        }
        if let Some(price) = self.unit_price {
            order.unit_price = Some(price);
        }
        if let Some(paid) = self.amount_paid {
            order.amount_paid = paid;
        }
        if let Some(mode) = self.calculation_mode {
            order.calculation_mode = mode;
        }
        if let Some(source) = self.inventory_source {
            order.inventory_source = source;
        }
        if let Some(batch) = self.source_batch_id {
            order.source_batch_id = batch;
        }
        if let Some(notes) = &self.notes {
            order.notes = Some(notes.clone());
        }
        if let Some(status) = self.status {
            order.status = status;
            order.status_override = true;
        }
        if self.clear_status_override {
            order.status_override = false;
        }
    }

    /// Reconciles the ledger with the edit. New units are reserved before
    /// old ones are released, so a failed reservation aborts the update with
    /// the previous holding intact.
    async fn settle_inventory(
        &self,
        ctx: &EngineContext,
        existing: &Order,
        updated: &Order,
    ) -> Result<(), EngineError> {
        let old_qty = existing.reserved_quantity();
        let new_qty = updated.reserved_quantity();
        let same_slot = existing.source_batch_id == updated.source_batch_id
            && existing.inventory_source == updated.inventory_source;

        if same_slot {
            let Some(batch_id) = updated.source_batch_id else {
                return Ok(());
            };
            let delta = new_qty - old_qty;
            if delta > 0 {
                let remaining = ctx
                    .ledger
                    .reserve(batch_id, &updated.inventory_source, delta)
                    .await?;
                self.send_inventory_event(
                    ctx,
                    Event::InventoryReserved {
                        batch_id,
                        source: updated.inventory_source,
                        quantity: delta,
                        remaining,
                    },
                )
                .await?;
            } else if delta < 0 {
                let remaining = ctx
                    .ledger
                    .release(batch_id, &existing.inventory_source, -delta)
                    .await?;
                self.send_inventory_event(
                    ctx,
                    Event::InventoryReleased {
                        batch_id,
                        source: existing.inventory_source,
                        quantity: -delta,
                        remaining,
                    },
                )
                .await?;
            }
            return Ok(());
        }

        if let Some(batch_id) = updated.source_batch_id {
            if new_qty > 0 {
                let remaining = ctx
                    .ledger
                    .reserve(batch_id, &updated.inventory_source, new_qty)
                    .await?;
                self.send_inventory_event(
                    ctx,
                    Event::InventoryReserved {
                        batch_id,
                        source: updated.inventory_source,
                        quantity: new_qty,
                        remaining,
                    },
                )
                .await?;
            }
        }
        if let Some(batch_id) = existing.source_batch_id {
            if old_qty > 0 {
                let remaining = ctx
                    .ledger
                    .release(batch_id, &existing.inventory_source, old_qty)
                    .await?;
                self.send_inventory_event(
                    ctx,
                    Event::InventoryReleased {
                        batch_id,
                        source: existing.inventory_source,
                        quantity: old_qty,
                        remaining,
                    },
                )
                .await?;
            }
        }
        Ok(())
    }

    async fn send_inventory_event(
        &self,
        ctx: &EngineContext,
        event: Event,
    ) -> Result<(), EngineError> {
        ctx.event_sender
            .send(event)
            .await
            .map_err(EngineError::EventError)
    }

    async fn log_and_trigger_events(
        &self,
        ctx: &EngineContext,
        existing: &Order,
        updated: &Order,
    ) -> Result<(), EngineError> {
        info!(
            order_id = %updated.id,
            total = %updated.total,
            balance = %updated.balance,
            status = %updated.status,
            "Order updated successfully"
        );

        let record = ChangeSet::new(updated.id, "order")
            .record("customer_name", &existing.customer_name, &updated.customer_name)
            .record("order_date", &existing.order_date, &updated.order_date)
            .record(
                "quantity_count",
                &existing.quantity_count,
                &updated.quantity_count,
            )
            .record("unit_size", &existing.unit_size, &updated.unit_size)
            .record("unit_price", &existing.unit_price, &updated.unit_price)
            .record("amount_paid", &existing.amount_paid, &updated.amount_paid)
            .record(
                "calculation_mode",
                &existing.calculation_mode,
                &updated.calculation_mode,
            )
            .record(
                "inventory_source",
                &existing.inventory_source,
                &updated.inventory_source,
            )
            .record(
                "source_batch_id",
                &existing.source_batch_id,
                &updated.source_batch_id,
            )
            .record("status", &existing.status, &updated.status)
            .record("notes", &existing.notes, &updated.notes)
            .record("total", &existing.total, &updated.total)
            .record("balance", &existing.balance, &updated.balance)
            .finish();
        ctx.event_sender
            .send(Event::ChangeRecorded(record))
            .await
            .map_err(EngineError::EventError)?;

        if existing.status != updated.status {
            ctx.event_sender
                .send(Event::OrderStatusChanged {
                    order_id: updated.id,
                    old_status: existing.status,
                    new_status: updated.status,
                })
                .await
                .map_err(EngineError::EventError)?;
        }

        if updated.status == OrderStatus::Cancelled && existing.status != OrderStatus::Cancelled {
            ctx.event_sender
                .send(Event::OrderCancelled(updated.id))
                .await
                .map_err(EngineError::EventError)?;
        }

        ctx.event_sender
            .send(Event::OrderUpdated(updated.id))
            .await
            .map_err(EngineError::EventError)
    }
}
