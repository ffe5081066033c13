use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How much of the source batch a processing run consumed.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RelationshipKind {
    FullyProcessed,
    PartiallyProcessed,
}

/// A directed, timestamped edge from a live batch to the dressed batch it
/// produced, annotated with the number of birds moved across it.
///
/// Pure association: both endpoints are referenced by id and owned by the
/// inventory ledger.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BatchRelationship {
    pub id: Uuid,
    pub source_batch_id: Uuid,
    pub target_batch_id: Uuid,
    pub kind: RelationshipKind,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

impl BatchRelationship {
    pub fn new(
        source_batch_id: Uuid,
        target_batch_id: Uuid,
        kind: RelationshipKind,
        quantity: i32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_batch_id,
            target_batch_id,
            kind,
            quantity,
            created_at: Utc::now(),
        }
    }
}
