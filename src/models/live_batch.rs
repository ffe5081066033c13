use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Enum representing the possible statuses of a live batch.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LiveBatchStatus {
    Healthy,
    Sick,
    Quarantine,
    Processing,
}

/// A cohort of living birds tracked as one inventory unit.
///
/// `initial_count` is immutable after creation; `current_count` only ever
/// decreases (sales, mortality, processing) and never exceeds it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LiveBatch {
    pub id: Uuid,

    /// Human-readable batch code, e.g. "LB-2024-031".
    pub batch_code: String,

    pub initial_count: i32,

    pub current_count: i32,

    /// Average live weight per bird, in kilograms.
    pub average_weight: Decimal,

    pub status: LiveBatchStatus,

    pub acquired_date: DateTime<Utc>,

    pub updated_at: Option<DateTime<Utc>>,

    /// Bumped by the ledger on every count mutation; the processing
    /// transaction commits against it.
    pub version: u64,
}

impl LiveBatch {
    /// Creates a fresh healthy batch with its full headcount available.
    pub fn new(batch_code: impl Into<String>, initial_count: i32, average_weight: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            batch_code: batch_code.into(),
            initial_count,
            current_count: initial_count,
            average_weight,
            status: LiveBatchStatus::Healthy,
            acquired_date: Utc::now(),
            updated_at: None,
            version: 1,
        }
    }

    /// Birds lost to causes other than sales or processing.
    ///
    /// `processed_out` is the total quantity moved across this batch's
    /// outgoing lineage edges, owned by the relationship graph.
    pub fn mortality(&self, processed_out: i32) -> i32 {
        self.initial_count - self.current_count - processed_out
    }
}
