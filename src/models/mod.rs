pub mod batch_relationship;
pub mod dressed_batch;
pub mod live_batch;
pub mod order;

pub use batch_relationship::{BatchRelationship, RelationshipKind};
pub use dressed_batch::{DressedBatch, DressedBatchStatus, PartType};
pub use live_batch::{LiveBatch, LiveBatchStatus};
pub use order::{CalculationMode, InventorySource, Order, OrderStatus};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Valid-but-unusual states an operation reports alongside its result.
///
/// These are not failures: the source data is accepted as-is, but the caller
/// should surface them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DomainWarning {
    /// Dressed units recorded for a batch disagree with the birds processed
    /// into it; the rate is reported unclamped.
    YieldOutOfRange {
        dressed_batch_id: Uuid,
        rate: Decimal,
    },
    /// A manually pinned order status no longer matches the status derived
    /// from the amount paid.
    StatusOverrideDisagreement {
        order_id: Uuid,
        stored: OrderStatus,
        derived: OrderStatus,
    },
}
