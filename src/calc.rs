//! Order money math.
//!
//! The single place totals, balances, and payment statuses are computed.
//! Create, update, batch-update, and every summary path call in here, so all
//! of them agree by construction.

use rust_decimal::Decimal;

use crate::models::{CalculationMode, DomainWarning, Order, OrderStatus};

/// Computes an order's monetary total.
///
/// Missing inputs coerce to zero instead of failing, so a malformed order
/// totals 0 on display paths; rejecting malformed input is validation's job,
/// before anything is committed.
pub fn compute_total(
    quantity_count: Option<i32>,
    unit_size: Option<Decimal>,
    unit_price: Option<Decimal>,
    mode: CalculationMode,
) -> Decimal {
    let count = Decimal::from(quantity_count.unwrap_or(0));
    let size = unit_size.unwrap_or(Decimal::ZERO);
    let price = unit_price.unwrap_or(Decimal::ZERO);

    match mode {
        CalculationMode::CountTimesPrice => count * price,
        CalculationMode::SizeTimesPrice => size * price,
        CalculationMode::CountTimesSizeTimesPrice => count * size * price,
    }
}

/// Outstanding balance, floored at zero: overpayment never goes negative.
pub fn compute_balance(total: Decimal, amount_paid: Decimal) -> Decimal {
    (total - amount_paid).max(Decimal::ZERO)
}

/// Derives the payment status from the amount paid against the total.
pub fn derive_payment_status(total: Decimal, amount_paid: Decimal) -> OrderStatus {
    if total.is_zero() {
        OrderStatus::Pending
    } else if amount_paid >= total {
        OrderStatus::Paid
    } else if amount_paid > Decimal::ZERO {
        OrderStatus::Partial
    } else {
        OrderStatus::Pending
    }
}

/// The three derived figures, always computed together.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderFinancials {
    pub total: Decimal,
    pub balance: Decimal,
    pub derived_status: OrderStatus,
}

impl OrderFinancials {
    pub fn for_order(order: &Order) -> Self {
        let total = compute_total(
            order.quantity_count,
            order.unit_size,
            order.unit_price,
            order.calculation_mode,
        );
        let balance = compute_balance(total, order.amount_paid);
        let derived_status = derive_payment_status(total, order.amount_paid);
        Self {
            total,
            balance,
            derived_status,
        }
    }
}

/// Recomputes and caches an order's financials in place.
///
/// The status is re-derived unless the caller pinned it; a pinned status
/// that disagrees with the derived one is reported as a warning, not
/// silently re-derived. Cancelled orders keep their terminal status without
/// a warning.
pub fn refresh_order(order: &mut Order) -> Option<DomainWarning> {
    let financials = OrderFinancials::for_order(order);
    order.total = financials.total;
    order.balance = financials.balance;

    if order.status == OrderStatus::Cancelled {
        return None;
    }

    if order.status_override {
        if order.status != financials.derived_status {
            return Some(DomainWarning::StatusOverrideDisagreement {
                order_id: order.id,
                stored: order.status,
                derived: financials.derived_status,
            });
        }
        return None;
    }

    order.status = financials.derived_status;
    None
}
