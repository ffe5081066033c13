use crate::{
    audit::ChangeSet,
    calc,
    commands::Command,
    errors::EngineError,
    events::Event,
    models::{CalculationMode, InventorySource, Order, OrderStatus},
    EngineContext,
};
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use prometheus::IntCounter;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;
use validator::Validate;

lazy_static! {
    static ref ORDER_COMMITS: IntCounter =
        IntCounter::new("order_commits_total", "Total number of orders committed")
            .expect("metric can be created");
    static ref ORDER_COMMIT_FAILURES: IntCounter = IntCounter::new(
        "order_commit_failures_total",
        "Total number of failed order commits"
    )
    .expect("metric can be created");
}

/// Commits a new order: validates it, reserves its inventory, caches its
/// computed financials, and stores it.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateOrderCommand {
    #[validate(length(min = 1, message = "Customer name is required"))]
    pub customer_name: String,
    pub order_date: DateTime<Utc>,
    pub quantity_count: Option<i32>,
    pub unit_size: Option<Decimal>,
    pub unit_price: Option<Decimal>,
    #[serde(default)]
    pub amount_paid: Decimal,
    pub calculation_mode: CalculationMode,
    pub inventory_source: InventorySource,
    pub source_batch_id: Option<Uuid>,
    pub notes: Option<String>,
}

impl CreateOrderCommand {
    /// The order record this command would commit, computed fields unset.
    /// Also used by dry-run validation.
    pub(crate) fn to_order(&self) -> Order {
        Order {
            id: Uuid::new_v4(),
            customer_name: self.customer_name.clone(),
            order_date: self.order_date,
            quantity_count: self.quantity_count,
            unit_size: self.unit_size,
            unit_price: self.unit_price,
            amount_paid: self.amount_paid,
            calculation_mode: self.calculation_mode,
            inventory_source: self.inventory_source,
            source_batch_id: self.source_batch_id,
            status: OrderStatus::Pending,
            status_override: false,
            total: Decimal::ZERO,
            balance: Decimal::ZERO,
            notes: self.notes.clone(),
            created_at: Utc::now(),
            updated_at: None,
        }
    }
}

#[async_trait::async_trait]
impl Command for CreateOrderCommand {
    type Result = Order;

    #[instrument(skip(self, ctx), fields(customer_name = %self.customer_name))]
    async fn execute(&self, ctx: Arc<EngineContext>) -> Result<Self::Result, EngineError> {
        self.validate().map_err(|e| {
            ORDER_COMMIT_FAILURES.inc();
            let msg = format!("Invalid input: {}", e);
            error!("{}", msg);
            EngineError::ValidationError(msg)
        })?;

        let mut order = self.to_order();
        super::validate_order_record(&order).map_err(|e| {
            ORDER_COMMIT_FAILURES.inc();
            e
        })?;

        // Reserve before anything is stored, so a failed reservation leaves
        // no trace of the order.
        if let Some(batch_id) = order.source_batch_id {
            let quantity = order.reserved_quantity();
            if quantity > 0 {
                let remaining = ctx
                    .ledger
                    .reserve(batch_id, &order.inventory_source, quantity)
                    .await
                    .map_err(|e| {
                        ORDER_COMMIT_FAILURES.inc();
                        e
                    })?;
                ctx.event_sender
                    .send(Event::InventoryReserved {
                        batch_id,
                        source: order.inventory_source,
                        quantity,
                        remaining,
                    })
                    .await
                    .map_err(EngineError::EventError)?;
            }
        }

        calc::refresh_order(&mut order);
        ctx.orders.insert(order.clone())?;

        self.log_and_trigger_event(&ctx, &order).await?;
        ORDER_COMMITS.inc();
        Ok(order)
    }
}

impl CreateOrderCommand {
    async fn log_and_trigger_event(
        &self,
        ctx: &EngineContext,
        order: &Order,
    ) -> Result<(), EngineError> {
        info!(
            order_id = %order.id,
            customer_name = %order.customer_name,
            total = %order.total,
            status = %order.status,
            "Order committed successfully"
        );

        let record = ChangeSet::new(order.id, "order").created(order).finish();
        ctx.event_sender
            .send(Event::ChangeRecorded(record))
            .await
            .map_err(EngineError::EventError)?;

        ctx.event_sender
            .send(Event::OrderCreated(order.id))
            .await
            .map_err(|e| {
                ORDER_COMMIT_FAILURES.inc();
                let msg = format!("Failed to send event for committed order: {}", e);
                error!("{}", msg);
                EngineError::EventError(msg)
            })
    }
}
