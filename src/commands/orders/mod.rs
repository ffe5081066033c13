use crate::errors::EngineError;
use crate::models::{CalculationMode, Order};
use rust_decimal::Decimal;

pub mod batch_update_orders_command;
pub mod create_order_command;
pub mod update_order_command;

pub use batch_update_orders_command::{
    BatchOrderOutcome, BatchUpdateOrdersCommand, BatchUpdateOutcome, OrderSummary,
};
pub use create_order_command::CreateOrderCommand;
pub use update_order_command::{UpdateOrderCommand, UpdateOrderResult};

/// Field rules every committed order record must satisfy, shared by create,
/// update, and batch update so no path can store a shape the others reject.
///
/// Which of count and size is required depends on the calculation mode: a
/// size-times-price order needs no count, a count-times-price order needs no
/// size. Whatever is present must still be in range.
pub(crate) fn validate_order_record(order: &Order) -> Result<(), EngineError> {
    if order.customer_name.trim().is_empty() {
        return Err(EngineError::InvalidInput(
            "Customer name is required".to_string(),
        ));
    }

    match order.unit_price {
        None => {
            return Err(EngineError::InvalidInput(
                "Unit price is required".to_string(),
            ))
        }
        Some(price) if price <= Decimal::ZERO => {
            return Err(EngineError::InvalidInput(
                "Unit price must be positive".to_string(),
            ))
        }
        _ => {}
    }

    let count_required = order.calculation_mode != CalculationMode::SizeTimesPrice;
    match order.quantity_count {
        None if count_required => {
            return Err(EngineError::InvalidInput(format!(
                "Quantity count is required for {} orders",
                order.calculation_mode
            )))
        }
        Some(count) if count <= 0 && count_required => {
            return Err(EngineError::InvalidInput(
                "Quantity count must be positive".to_string(),
            ))
        }
        Some(count) if count < 0 => {
            return Err(EngineError::InvalidInput(
                "Quantity count must not be negative".to_string(),
            ))
        }
        _ => {}
    }

    let size_required = order.calculation_mode != CalculationMode::CountTimesPrice;
    match order.unit_size {
        None if size_required => {
            return Err(EngineError::InvalidInput(format!(
                "Unit size is required for {} orders",
                order.calculation_mode
            )))
        }
        Some(size) if size <= Decimal::ZERO && size_required => {
            return Err(EngineError::InvalidInput(
                "Unit size must be positive".to_string(),
            ))
        }
        Some(size) if size < Decimal::ZERO => {
            return Err(EngineError::InvalidInput(
                "Unit size must not be negative".to_string(),
            ))
        }
        _ => {}
    }

    if order.amount_paid < Decimal::ZERO {
        return Err(EngineError::InvalidInput(
            "Amount paid must not be negative".to_string(),
        ));
    }

    Ok(())
}
