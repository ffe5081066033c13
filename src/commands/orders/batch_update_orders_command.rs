use crate::{
    audit::ChangeSet,
    calc,
    commands::Command,
    errors::EngineError,
    events::Event,
    models::{DomainWarning, Order, OrderStatus},
    EngineContext,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// Applies a status change, a payment change, or both to a set of orders.
///
/// Every affected order is recomputed with its own calculation mode, count,
/// size, and price — the selection is never assumed to share a mode. Missing
/// ids are reported per order rather than failing the whole batch.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BatchUpdateOrdersCommand {
    #[validate(length(min = 1, message = "At least one order id is required"))]
    pub order_ids: Vec<Uuid>,
    /// Explicit status applied to each order; pins the status like a manual
    /// edit does.
    pub status: Option<OrderStatus>,
    /// Absolute amount-paid value applied to each order.
    pub amount_paid: Option<Decimal>,
    /// Payment added on top of each order's current amount paid.
    pub add_payment: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSummary {
    pub order_id: Uuid,
    pub customer_name: String,
    pub total: Decimal,
    pub balance: Decimal,
    pub status: OrderStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BatchOrderOutcome {
    Updated(OrderSummary),
    NotFound { order_id: Uuid },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchUpdateOutcome {
    pub results: Vec<BatchOrderOutcome>,
    pub updated_count: usize,
    /// Sum of the updated orders' totals.
    pub aggregate_total: Decimal,
    /// Sum of the updated orders' outstanding balances.
    pub aggregate_balance: Decimal,
    pub warnings: Vec<DomainWarning>,
}

#[async_trait::async_trait]
impl Command for BatchUpdateOrdersCommand {
    type Result = BatchUpdateOutcome;

    #[instrument(skip(self, ctx), fields(order_count = self.order_ids.len()))]
    async fn execute(&self, ctx: Arc<EngineContext>) -> Result<Self::Result, EngineError> {
        self.validate()
            .map_err(|e| EngineError::ValidationError(format!("Invalid input: {}", e)))?;
        self.validate_spec()?;

        let mut results = Vec::with_capacity(self.order_ids.len());
        let mut warnings = Vec::new();
        let mut updated_ids = Vec::new();
        let mut aggregate_total = Decimal::ZERO;
        let mut aggregate_balance = Decimal::ZERO;

        for &order_id in &self.order_ids {
            let Some(existing) = ctx.orders.get(order_id) else {
                warn!(order_id = %order_id, "Order not found during batch update");
                results.push(BatchOrderOutcome::NotFound { order_id });
                continue;
            };

            let updated = self
                .apply_to_order(&ctx, &existing, &mut warnings)
                .await?;

            aggregate_total += updated.total;
            aggregate_balance += updated.balance;
            updated_ids.push(order_id);
            results.push(BatchOrderOutcome::Updated(OrderSummary {
                order_id,
                customer_name: updated.customer_name.clone(),
                total: updated.total,
                balance: updated.balance,
                status: updated.status,
            }));
        }

        info!(
            updated_count = updated_ids.len(),
            aggregate_total = %aggregate_total,
            aggregate_balance = %aggregate_balance,
            "Batch update applied"
        );

        if !updated_ids.is_empty() {
            ctx.event_sender
                .send(Event::OrdersBatchUpdated {
                    order_ids: updated_ids.clone(),
                })
                .await
                .map_err(EngineError::EventError)?;
        }

        Ok(BatchUpdateOutcome {
            updated_count: updated_ids.len(),
            results,
            aggregate_total,
            aggregate_balance,
            warnings,
        })
    }
}

impl BatchUpdateOrdersCommand {
    fn validate_spec(&self) -> Result<(), EngineError> {
        if self.status.is_none() && self.amount_paid.is_none() && self.add_payment.is_none() {
            return Err(EngineError::InvalidInput(
                "Batch update must change a status or a payment amount".to_string(),
            ));
        }
        if self.amount_paid.is_some() && self.add_payment.is_some() {
            return Err(EngineError::InvalidInput(
                "Use either an absolute amount paid or an added payment, not both".to_string(),
            ));
        }
        if let Some(paid) = self.amount_paid {
            if paid < Decimal::ZERO {
                return Err(EngineError::InvalidInput(
                    "Amount paid must not be negative".to_string(),
                ));
            }
        }
        if let Some(added) = self.add_payment {
            if added <= Decimal::ZERO {
                return Err(EngineError::InvalidInput(
                    "Added payment must be positive".to_string(),
                ));
            }
        }
        Ok(())
    }

    async fn apply_to_order(
        &self,
        ctx: &EngineContext,
        existing: &Order,
        warnings: &mut Vec<DomainWarning>,
    ) -> Result<Order, EngineError> {
        let mut updated = existing.clone();

        if let Some(paid) = self.amount_paid {
            updated.amount_paid = paid;
        }
        if let Some(added) = self.add_payment {
            updated.amount_paid += added;
        }
        if let Some(status) = self.status {
            updated.status = status;
            updated.status_override = true;
        }

        // A cancellation through batch update returns the order's units just
        // like a single-order cancellation would.
        if updated.status == OrderStatus::Cancelled && existing.status != OrderStatus::Cancelled {
            if let Some(batch_id) = existing.source_batch_id {
                let quantity = existing.reserved_quantity();
                if quantity > 0 {
                    let remaining = ctx
                        .ledger
                        .release(batch_id, &existing.inventory_source, quantity)
                        .await?;
                    ctx.event_sender
                        .send(Event::InventoryReleased {
                            batch_id,
                            source: existing.inventory_source,
                            quantity,
                            remaining,
                        })
                        .await
                        .map_err(EngineError::EventError)?;
                }
            }
        }

        if let Some(warning) = calc::refresh_order(&mut updated) {
            warnings.push(warning);
        }
        updated.updated_at = Some(chrono::Utc::now());

        ctx.orders.update(updated.clone())?;

        let record = ChangeSet::new(updated.id, "order")
            .record("amount_paid", &existing.amount_paid, &updated.amount_paid)
            .record("status", &existing.status, &updated.status)
            .record("total", &existing.total, &updated.total)
            .record("balance", &existing.balance, &updated.balance)
            .finish();
        ctx.event_sender
            .send(Event::ChangeRecorded(record))
            .await
            .map_err(EngineError::EventError)?;

        Ok(updated)
    }
}
