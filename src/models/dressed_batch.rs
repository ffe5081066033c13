use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Enum representing the possible statuses of a dressed batch.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DressedBatchStatus {
    InStorage,
    Sold,
    Expired,
    Damaged,
}

/// By-product part types produced when a batch is dressed.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PartType {
    Gizzard,
    Liver,
    Heart,
    Feet,
    Head,
    Neck,
}

/// A cohort of processed product: whole dressed birds plus by-product parts.
///
/// Whole-bird count and part counts deplete independently: selling gizzards
/// does not change the whole-bird count and vice versa. Records seeded from
/// outside the engine may be partially populated, which is why
/// `current_count` and `processing_quantity` are optional; see
/// [`DressedBatch::available_whole_units`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DressedBatch {
    pub id: Uuid,

    /// Human-readable batch code, e.g. "DB-2024-017".
    pub batch_code: String,

    /// Whole-bird units produced when the batch was dressed.
    pub initial_count: i32,

    /// Whole-bird units still in storage; unset on partially-populated
    /// seeded records.
    pub current_count: Option<i32>,

    /// Birds processed into this batch as recorded at processing time;
    /// unset on records that predate that bookkeeping.
    pub processing_quantity: Option<i32>,

    /// Average dressed weight per bird, in kilograms.
    pub average_weight: Decimal,

    /// Per-part unit counts, depleted independently of whole birds.
    pub parts_count: HashMap<PartType, i32>,

    /// Per-part total weights in kilograms.
    pub parts_weight: HashMap<PartType, Decimal>,

    pub status: DressedBatchStatus,

    pub expiry_date: Option<DateTime<Utc>>,

    pub processed_date: DateTime<Utc>,

    pub updated_at: Option<DateTime<Utc>>,

    /// Bumped by the ledger on every count mutation.
    pub version: u64,
}

impl DressedBatch {
    /// Whole-bird units available for sale, tolerating partially-populated
    /// records: `current_count`, falling back to `processing_quantity`, then
    /// `initial_count`, in that priority order.
    pub fn available_whole_units(&self) -> i32 {
        self.current_count
            .or(self.processing_quantity)
            .unwrap_or(self.initial_count)
    }

    /// Dressed units produced, as used by yield computation: the recorded
    /// processing quantity when present, else the initial count.
    pub fn dressed_units_produced(&self) -> i32 {
        self.processing_quantity.unwrap_or(self.initial_count)
    }

    /// Units available for the given part type.
    pub fn part_count(&self, part: PartType) -> i32 {
        self.parts_count.get(&part).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn seeded_batch() -> DressedBatch {
        DressedBatch {
            id: Uuid::new_v4(),
            batch_code: "DB-001".to_string(),
            initial_count: 60,
            current_count: Some(45),
            processing_quantity: Some(60),
            average_weight: dec!(1.4),
            parts_count: HashMap::from([(PartType::Gizzard, 55), (PartType::Liver, 58)]),
            parts_weight: HashMap::from([
                (PartType::Gizzard, dec!(4.1)),
                (PartType::Liver, dec!(3.2)),
            ]),
            status: DressedBatchStatus::InStorage,
            expiry_date: None,
            processed_date: Utc::now(),
            updated_at: None,
            version: 1,
        }
    }

    #[test]
    fn available_units_prefer_current_count() {
        let batch = seeded_batch();
        assert_eq!(batch.available_whole_units(), 45);
    }

    #[test]
    fn available_units_fall_back_in_priority_order() {
        let mut batch = seeded_batch();
        batch.current_count = None;
        assert_eq!(batch.available_whole_units(), 60, "processing quantity");

        batch.processing_quantity = None;
        batch.initial_count = 50;
        assert_eq!(batch.available_whole_units(), 50, "initial count");
    }

    #[test]
    fn part_counts_are_independent_of_whole_birds() {
        let batch = seeded_batch();
        assert_eq!(batch.part_count(PartType::Gizzard), 55);
        assert_eq!(batch.part_count(PartType::Feet), 0);
        assert_eq!(batch.available_whole_units(), 45);
    }
}
