use crate::{
    audit::ChangeSet,
    commands::Command,
    errors::EngineError,
    events::Event,
    models::{
        BatchRelationship, DressedBatch, DressedBatchStatus, LiveBatch, LiveBatchStatus, PartType,
        RelationshipKind,
    },
    EngineContext,
};
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use prometheus::IntCounter;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

lazy_static! {
    static ref PROCESSING_RUNS: IntCounter = IntCounter::new(
        "batch_processing_runs_total",
        "Total number of processing transactions committed"
    )
    .expect("metric can be created");
    static ref PROCESSING_FAILURES: IntCounter = IntCounter::new(
        "batch_processing_failures_total",
        "Total number of failed processing transactions"
    )
    .expect("metric can be created");
    static ref PROCESSING_CONFLICT_RETRIES: IntCounter = IntCounter::new(
        "batch_processing_conflict_retries_total",
        "Processing commits retried after losing a version race"
    )
    .expect("metric can be created");
}

/// By-product yield of one part type from a processing run. Count and weight
/// must both be present or both be zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartYield {
    pub part: PartType,
    pub count: i32,
    pub weight: Decimal,
}

/// Converts birds from a live batch into a new dressed batch as one atomic
/// state transition: decrement the source, create the dressed batch, record
/// the lineage edge, and optionally relabel the remainder under a new batch
/// code. Failure at any step leaves no partial mutation observable.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ProcessBatchCommand {
    pub source_batch_id: Uuid,
    pub quantity: i32,
    #[validate(length(min = 1, message = "Dressed batch code is required"))]
    pub dressed_batch_code: String,
    /// Average dressed weight; defaults to the source batch's last recorded
    /// weight when absent.
    pub average_weight_override: Option<Decimal>,
    #[serde(default)]
    pub parts: Vec<PartYield>,
    pub expiry_date: Option<DateTime<Utc>>,
    /// Move the unprocessed remainder to a fresh batch code, zeroing out the
    /// original batch.
    #[serde(default)]
    pub split_remainder: bool,
    pub remainder_batch_code: Option<String>,
}

/// Everything a processing run produced, post-commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingOutcome {
    pub source_batch: LiveBatch,
    pub dressed_batch: DressedBatch,
    pub remainder_batch: Option<LiveBatch>,
    pub relationship: BatchRelationship,
}

#[async_trait::async_trait]
impl Command for ProcessBatchCommand {
    type Result = ProcessingOutcome;

    #[instrument(skip(self, ctx), fields(source_batch_id = %self.source_batch_id, quantity = self.quantity))]
    async fn execute(&self, ctx: Arc<EngineContext>) -> Result<Self::Result, EngineError> {
        self.validate_inputs().map_err(|e| {
            PROCESSING_FAILURES.inc();
            error!("Invalid processing request: {}", e);
            e
        })?;

        let mut attempts = 0u32;
        loop {
            match self.try_process(&ctx).await {
                Ok((outcome, snapshot)) => {
                    PROCESSING_RUNS.inc();
                    self.log_and_trigger_events(&ctx, &outcome, &snapshot).await?;
                    return Ok(outcome);
                }
                Err(EngineError::ConcurrencyConflict(batch_id))
                    if attempts < ctx.config.max_conflict_retries =>
                {
                    attempts += 1;
                    PROCESSING_CONFLICT_RETRIES.inc();
                    warn!(
                        source_batch_id = %batch_id,
                        attempt = attempts,
                        "Processing commit lost a version race; retrying from a fresh snapshot"
                    );
                }
                Err(e) => {
                    PROCESSING_FAILURES.inc();
                    return Err(e);
                }
            }
        }
    }
}

impl ProcessBatchCommand {
    fn validate_inputs(&self) -> Result<(), EngineError> {
        self.validate()
            .map_err(|e| EngineError::ValidationError(format!("Invalid input: {}", e)))?;

        if self.quantity <= 0 {
            return Err(EngineError::InvalidInput(
                "Quantity to process must be positive".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for part in &self.parts {
            if !seen.insert(part.part) {
                return Err(EngineError::InvalidInput(format!(
                    "Part {} appears more than once",
                    part.part
                )));
            }
            if part.count < 0 || part.weight < Decimal::ZERO {
                return Err(EngineError::InvalidInput(format!(
                    "Part {} count and weight must not be negative",
                    part.part
                )));
            }
            // A count with zero weight, or weight with zero count, is a
            // bookkeeping error, not a default to fill in.
            let count_given = part.count > 0;
            let weight_given = part.weight > Decimal::ZERO;
            if count_given != weight_given {
                return Err(EngineError::InvalidInput(format!(
                    "Part {} must have both count and weight, or neither",
                    part.part
                )));
            }
        }

        if self.split_remainder
            && self
                .remainder_batch_code
                .as_deref()
                .map(str::trim)
                .unwrap_or("")
                .is_empty()
        {
            return Err(EngineError::InvalidInput(
                "Remainder batch code is required when splitting the remainder".to_string(),
            ));
        }

        Ok(())
    }

    /// One optimistic attempt: snapshot, build, record the edge, commit the
    /// ledger writes against the snapshot version. A lost race removes the
    /// edge again so the retry starts clean. Returns the outcome together
    /// with the snapshot the writes were built from.
    async fn try_process(
        &self,
        ctx: &EngineContext,
    ) -> Result<(ProcessingOutcome, LiveBatch), EngineError> {
        let snapshot = ctx.ledger.live_batch(self.source_batch_id).await?;

        if self.quantity > snapshot.current_count {
            return Err(EngineError::InsufficientInventory {
                requested: self.quantity,
                available: snapshot.current_count,
            });
        }

        // Kind is judged against the count before any decrement.
        let kind = if self.quantity < snapshot.current_count {
            RelationshipKind::PartiallyProcessed
        } else {
            RelationshipKind::FullyProcessed
        };

        let dressed = self.build_dressed_batch(&snapshot);
        let leftover = snapshot.current_count - self.quantity;

        let remainder = if self.split_remainder && leftover > 0 {
            let code = self
                .remainder_batch_code
                .clone()
                .unwrap_or_default();
            let mut batch = LiveBatch::new(code, leftover, snapshot.average_weight);
            batch.status = snapshot.status;
            Some(batch)
        } else {
            None
        };

        let mut updated_source = snapshot.clone();
        // With a split, the remainder moves to the new batch id and the
        // original cohort is drained.
        updated_source.current_count = if remainder.is_some() { 0 } else { leftover };
        if updated_source.current_count == 0 {
            updated_source.status = LiveBatchStatus::Processing;
        }

        let edge = ctx.graph.record_processing(
            snapshot.initial_count,
            BatchRelationship::new(snapshot.id, dressed.id, kind, self.quantity),
        )?;

        match ctx
            .ledger
            .commit_processing(
                snapshot.id,
                snapshot.version,
                updated_source,
                dressed.clone(),
                remainder.clone(),
            )
            .await
        {
            Ok(()) => {
                let source_batch = ctx.ledger.live_batch(snapshot.id).await?;
                Ok((
                    ProcessingOutcome {
                        source_batch,
                        dressed_batch: dressed,
                        remainder_batch: remainder,
                        relationship: edge,
                    },
                    snapshot,
                ))
            }
            Err(e) => {
                // The edge was recorded ahead of the commit; unwind it so a
                // retry (or the caller) starts from a consistent graph.
                ctx.graph.remove_edge(&edge);
                Err(e)
            }
        }
    }

    fn build_dressed_batch(&self, source: &LiveBatch) -> DressedBatch {
        let mut parts_count = HashMap::new();
        let mut parts_weight = HashMap::new();
        for part in &self.parts {
            if part.count > 0 {
                parts_count.insert(part.part, part.count);
                parts_weight.insert(part.part, part.weight);
            }
        }

        DressedBatch {
            id: Uuid::new_v4(),
            batch_code: self.dressed_batch_code.clone(),
            initial_count: self.quantity,
            current_count: Some(self.quantity),
            processing_quantity: Some(self.quantity),
            average_weight: self
                .average_weight_override
                .unwrap_or(source.average_weight),
            parts_count,
            parts_weight,
            status: DressedBatchStatus::InStorage,
            expiry_date: self.expiry_date,
            processed_date: Utc::now(),
            updated_at: None,
            version: 1,
        }
    }

    async fn log_and_trigger_events(
        &self,
        ctx: &EngineContext,
        outcome: &ProcessingOutcome,
        snapshot: &LiveBatch,
    ) -> Result<(), EngineError> {
        info!(
            source_batch_id = %outcome.source_batch.id,
            dressed_batch_id = %outcome.dressed_batch.id,
            quantity = self.quantity,
            kind = %outcome.relationship.kind,
            remainder = outcome.remainder_batch.is_some(),
            "Batch processed successfully"
        );

        let source_record = ChangeSet::new(outcome.source_batch.id, "live_batch")
            .record(
                "current_count",
                &snapshot.current_count,
                &outcome.source_batch.current_count,
            )
            .record("status", &snapshot.status, &outcome.source_batch.status)
            .finish();
        ctx.event_sender
            .send(Event::ChangeRecorded(source_record))
            .await
            .map_err(EngineError::EventError)?;

        let dressed_record = ChangeSet::new(outcome.dressed_batch.id, "dressed_batch")
            .created(&outcome.dressed_batch)
            .finish();
        ctx.event_sender
            .send(Event::ChangeRecorded(dressed_record))
            .await
            .map_err(EngineError::EventError)?;

        ctx.event_sender
            .send(Event::BatchProcessed {
                source_batch_id: outcome.source_batch.id,
                dressed_batch_id: outcome.dressed_batch.id,
                quantity: self.quantity,
                kind: outcome.relationship.kind,
            })
            .await
            .map_err(EngineError::EventError)?;

        if let Some(remainder) = &outcome.remainder_batch {
            let remainder_record = ChangeSet::new(remainder.id, "live_batch")
                .created(remainder)
                .finish();
            ctx.event_sender
                .send(Event::ChangeRecorded(remainder_record))
                .await
                .map_err(EngineError::EventError)?;

            ctx.event_sender
                .send(Event::LiveBatchSplit {
                    source_batch_id: outcome.source_batch.id,
                    remainder_batch_id: remainder.id,
                    quantity: remainder.current_count,
                })
                .await
                .map_err(EngineError::EventError)?;
        }

        Ok(())
    }
}
