use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::dressed_batch::PartType;

/// Enum representing the possible statuses of an order.
///
/// `Pending`, `Partial`, and `Paid` are derived from the amount paid;
/// `Confirmed`, `Completed`, and `Cancelled` are workflow states a caller
/// sets explicitly.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Partial,
    Paid,
    Confirmed,
    Completed,
    Cancelled,
}

/// Which of count, size, or both multiplies the unit price.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CalculationMode {
    CountTimesPrice,
    SizeTimesPrice,
    CountTimesSizeTimesPrice,
}

/// Which pool of inventory an order draws from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InventorySource {
    Live,
    DressedWhole,
    DressedPart(PartType),
}

/// One customer transaction.
///
/// `total` and `balance` are computed by the engine and cached here so every
/// consumer reads the same numbers; they are refreshed at commit, update, and
/// batch-update time, never ad hoc.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,

    /// Name of the customer who placed the order.
    pub customer_name: String,

    /// Date the order was placed.
    pub order_date: DateTime<Utc>,

    /// Number of units ordered; not required for size-times-price orders.
    pub quantity_count: Option<i32>,

    /// Unit size in kilograms; not required for count-times-price orders.
    pub unit_size: Option<Decimal>,

    /// Price per unit (or per kilogram, depending on the mode).
    pub unit_price: Option<Decimal>,

    /// Amount the customer has paid so far.
    pub amount_paid: Decimal,

    pub calculation_mode: CalculationMode,

    pub inventory_source: InventorySource,

    /// Batch this order draws against, if any. Weak reference: used for
    /// availability checks only, the order does not own the batch.
    pub source_batch_id: Option<Uuid>,

    pub status: OrderStatus,

    /// Set when a caller pinned the status explicitly on edit; while set,
    /// payment changes do not re-derive the status.
    pub status_override: bool,

    /// Cached computed total for the current quantity/size/price.
    pub total: Decimal,

    /// Cached computed balance, floored at zero.
    pub balance: Decimal,

    pub notes: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Updates the status of the order and stamps the modification time.
    pub fn update_status(&mut self, new_status: OrderStatus) {
        self.status = new_status;
        self.updated_at = Some(Utc::now());
    }

    /// Units this order holds against its source batch. Zero when the order
    /// references no batch or is cancelled.
    pub fn reserved_quantity(&self) -> i32 {
        if self.source_batch_id.is_none() || self.status == OrderStatus::Cancelled {
            return 0;
        }
        self.quantity_count.unwrap_or(0).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::str::FromStr;

    fn sample_order() -> Order {
        Order {
            id: Uuid::new_v4(),
            customer_name: "Mama Adaeze".to_string(),
            order_date: Utc::now(),
            quantity_count: Some(10),
            unit_size: Some(dec!(2.5)),
            unit_price: Some(dec!(500)),
            amount_paid: dec!(0),
            calculation_mode: CalculationMode::CountTimesSizeTimesPrice,
            inventory_source: InventorySource::Live,
            source_batch_id: None,
            status: OrderStatus::Pending,
            status_override: false,
            total: dec!(0),
            balance: dec!(0),
            notes: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn status_update_stamps_modification_time() {
        let mut order = sample_order();
        assert!(order.updated_at.is_none());
        order.update_status(OrderStatus::Confirmed);
        assert_eq!(order.status, OrderStatus::Confirmed);
        assert!(order.updated_at.is_some());
    }

    #[test]
    fn reserved_quantity_ignores_cancelled_and_batchless_orders() {
        let mut order = sample_order();
        assert_eq!(order.reserved_quantity(), 0, "no batch referenced");

        order.source_batch_id = Some(Uuid::new_v4());
        assert_eq!(order.reserved_quantity(), 10);

        order.update_status(OrderStatus::Cancelled);
        assert_eq!(order.reserved_quantity(), 0);
    }

    #[test]
    fn status_round_trips_through_strings() {
        assert_eq!(OrderStatus::Partial.to_string(), "partial");
        assert_eq!(
            OrderStatus::from_str("partial").unwrap(),
            OrderStatus::Partial
        );
        assert!(OrderStatus::from_str("unknown").is_err());
    }

    #[test]
    fn inventory_source_serializes_part_variant() {
        let source = InventorySource::DressedPart(PartType::Gizzard);
        let json = serde_json::to_string(&source).unwrap();
        let back: InventorySource = serde_json::from_str(&json).unwrap();
        assert_eq!(back, source);
    }
}
