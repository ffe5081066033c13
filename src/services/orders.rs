use dashmap::DashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::commands::orders::{
    BatchUpdateOrdersCommand, BatchUpdateOutcome, CreateOrderCommand, UpdateOrderCommand,
    UpdateOrderResult,
};
use crate::commands::Command;
use crate::errors::EngineError;
use crate::models::{Order, OrderStatus};
use crate::EngineContext;

/// Engine-held collection of orders.
///
/// Orders live inside the engine so batch updates can recompute each one
/// from its own stored fields; the collaborator persisting orders mirrors
/// this collection, it does not replace it.
#[derive(Default)]
pub struct OrderStore {
    orders: DashMap<Uuid, Order>,
}

impl OrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, order: Order) -> Result<(), EngineError> {
        if self.orders.contains_key(&order.id) {
            return Err(EngineError::InvalidInput(format!(
                "Order {} already exists",
                order.id
            )));
        }
        self.orders.insert(order.id, order);
        Ok(())
    }

    pub fn get(&self, order_id: Uuid) -> Option<Order> {
        self.orders.get(&order_id).map(|o| o.value().clone())
    }

    pub fn update(&self, order: Order) -> Result<(), EngineError> {
        if !self.orders.contains_key(&order.id) {
            return Err(EngineError::NotFound(format!(
                "Order {} not found",
                order.id
            )));
        }
        self.orders.insert(order.id, order);
        Ok(())
    }

    pub fn all(&self) -> Vec<Order> {
        self.orders.iter().map(|o| o.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

/// Service for validating, committing, and reconciling orders
#[derive(Clone)]
pub struct OrderService {
    ctx: Arc<EngineContext>,
}

impl OrderService {
    /// Creates a new order service instance
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        Self { ctx }
    }

    /// Dry-run validation of a proposed order: field rules plus an
    /// availability check against the referenced batch. Nothing is reserved
    /// or stored.
    #[instrument(skip(self, command), fields(customer_name = %command.customer_name))]
    pub async fn validate_order(&self, command: &CreateOrderCommand) -> Result<(), EngineError> {
        command
            .validate()
            .map_err(|e| EngineError::ValidationError(format!("Invalid input: {}", e)))?;

        let order = command.to_order();
        crate::commands::orders::validate_order_record(&order)?;

        if let Some(batch_id) = order.source_batch_id {
            let quantity = order.reserved_quantity();
            if quantity > 0 {
                let available = self
                    .ctx
                    .ledger
                    .available_quantity(batch_id, &order.inventory_source)
                    .await?;
                if quantity > available {
                    return Err(EngineError::InsufficientInventory {
                        requested: quantity,
                        available,
                    });
                }
            }
        }
        Ok(())
    }

    /// Validates and commits an order, reserving its inventory and caching
    /// its computed total, balance, and derived status.
    pub async fn commit_order(&self, command: CreateOrderCommand) -> Result<Order, EngineError> {
        command.execute(self.ctx.clone()).await
    }

    /// Edits an order, reconciling inventory and recomputing financials.
    pub async fn update_order(
        &self,
        command: UpdateOrderCommand,
    ) -> Result<UpdateOrderResult, EngineError> {
        command.execute(self.ctx.clone()).await
    }

    /// Applies a status and/or payment change across a set of orders, each
    /// recomputed with its own calculation mode.
    pub async fn batch_update(
        &self,
        command: BatchUpdateOrdersCommand,
    ) -> Result<BatchUpdateOutcome, EngineError> {
        command.execute(self.ctx.clone()).await
    }

    /// Cancels an order, releasing whatever units it still holds.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn cancel_order(
        &self,
        order_id: Uuid,
        reason: Option<String>,
    ) -> Result<UpdateOrderResult, EngineError> {
        let command = UpdateOrderCommand {
            order_id,
            status: Some(OrderStatus::Cancelled),
            notes: reason,
            ..UpdateOrderCommand::default()
        };
        let result = self.update_order(command).await?;
        info!(order_id = %order_id, "Order cancelled");
        Ok(result)
    }

    /// Retrieves an order by ID
    pub fn get_order(&self, order_id: Uuid) -> Option<Order> {
        self.ctx.orders.get(order_id)
    }

    /// Snapshot of all orders, for display collaborators.
    pub fn orders(&self) -> Vec<Order> {
        self.ctx.orders.all()
    }
}
