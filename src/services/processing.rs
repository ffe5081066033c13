//! Processing surface: the batch conversion transaction plus the lineage,
//! yield, and mortality queries built on top of the ledger and graph.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::audit::ChangeSet;
use crate::commands::processing::{ProcessBatchCommand, ProcessingOutcome};
use crate::commands::Command;
use crate::errors::EngineError;
use crate::events::Event;
use crate::models::{BatchRelationship, DomainWarning, RelationshipKind};
use crate::EngineContext;

/// Yield of a dressed batch against the birds processed into it.
///
/// A rate outside [0, 100] is reported as recorded, with a warning attached;
/// it means the dressed units were booked inconsistently with the edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YieldReport {
    pub dressed_batch_id: Uuid,
    pub source_batch_id: Uuid,
    pub birds_processed: i32,
    pub dressed_units: i32,
    /// Percentage, unclamped.
    pub rate: Decimal,
    pub warning: Option<DomainWarning>,
}

/// Headcount accounting for a live batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MortalityReport {
    pub batch_id: Uuid,
    pub initial_count: i32,
    pub current_count: i32,
    /// Birds moved out across all processing edges.
    pub processed_out: i32,
    /// Birds lost to causes other than sales or processing.
    pub mortality: i32,
}

/// Service for processing live batches into dressed batches
#[derive(Clone)]
pub struct ProcessingService {
    ctx: Arc<EngineContext>,
}

impl ProcessingService {
    /// Creates a new processing service instance
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        Self { ctx }
    }

    /// Runs the processing transaction: converts birds from a live batch
    /// into a new dressed batch, atomically.
    pub async fn process_batch(
        &self,
        command: ProcessBatchCommand,
    ) -> Result<ProcessingOutcome, EngineError> {
        command.execute(self.ctx.clone()).await
    }

    /// Records a lineage edge directly, for importing bookkeeping of batches
    /// processed outside the engine. Both endpoints must exist; the edge is
    /// subject to the same capacity and single-origin checks as processing.
    #[instrument(skip(self))]
    pub async fn record_processing(
        &self,
        source_batch_id: Uuid,
        target_batch_id: Uuid,
        quantity: i32,
        kind: RelationshipKind,
    ) -> Result<BatchRelationship, EngineError> {
        let source = self.ctx.ledger.live_batch(source_batch_id).await?;
        self.ctx.ledger.dressed_batch(target_batch_id).await?;

        let edge = self.ctx.graph.record_processing(
            source.initial_count,
            BatchRelationship::new(source_batch_id, target_batch_id, kind, quantity),
        )?;

        info!(
            source_batch_id = %source_batch_id,
            target_batch_id = %target_batch_id,
            quantity,
            "Processing relationship recorded"
        );

        if let Err(e) = self
            .ctx
            .event_sender
            .send(Event::BatchProcessed {
                source_batch_id,
                dressed_batch_id: target_batch_id,
                quantity,
                kind,
            })
            .await
        {
            warn!(error = %e, "Failed to send batch processed event");
        }

        Ok(edge)
    }

    /// The single inbound edge describing a dressed batch's origin, if any.
    pub fn lineage_of(&self, dressed_batch_id: Uuid) -> Option<BatchRelationship> {
        self.ctx.graph.lineage_of(dressed_batch_id)
    }

    /// Dressed units produced per bird processed, as a percentage.
    #[instrument(skip(self))]
    pub async fn yield_rate(&self, dressed_batch_id: Uuid) -> Result<YieldReport, EngineError> {
        let edge = self.ctx.graph.lineage_of(dressed_batch_id).ok_or_else(|| {
            EngineError::NotFound(format!(
                "Dressed batch {} has no processing lineage",
                dressed_batch_id
            ))
        })?;
        let batch = self.ctx.ledger.dressed_batch(dressed_batch_id).await?;

        let dressed_units = batch.dressed_units_produced();
        let rate = Decimal::from(dressed_units) * Decimal::ONE_HUNDRED / Decimal::from(edge.quantity);

        let warning = if rate < Decimal::ZERO || rate > Decimal::ONE_HUNDRED {
            warn!(
                dressed_batch_id = %dressed_batch_id,
                rate = %rate,
                "Yield rate outside [0, 100]; dressed units recorded inconsistently with birds processed"
            );
            Some(DomainWarning::YieldOutOfRange {
                dressed_batch_id,
                rate,
            })
        } else {
            None
        };

        Ok(YieldReport {
            dressed_batch_id,
            source_batch_id: edge.source_batch_id,
            birds_processed: edge.quantity,
            dressed_units,
            rate,
            warning,
        })
    }

    /// Headcount accounting for a live batch, joining ledger counts with the
    /// graph's processed-out total.
    pub async fn batch_mortality(
        &self,
        live_batch_id: Uuid,
    ) -> Result<MortalityReport, EngineError> {
        let batch = self.ctx.ledger.live_batch(live_batch_id).await?;
        let processed_out = self.ctx.graph.processed_out_of(live_batch_id);
        Ok(MortalityReport {
            batch_id: live_batch_id,
            initial_count: batch.initial_count,
            current_count: batch.current_count,
            processed_out,
            mortality: batch.mortality(processed_out),
        })
    }

    /// Records bird deaths on a live batch. Returns the new current count.
    #[instrument(skip(self))]
    pub async fn record_mortality(
        &self,
        batch_id: Uuid,
        quantity: i32,
    ) -> Result<i32, EngineError> {
        let remaining = self.ctx.ledger.record_mortality(batch_id, quantity).await?;

        info!(batch_id = %batch_id, quantity, remaining, "Mortality recorded");

        let record = ChangeSet::new(batch_id, "live_batch")
            .record("current_count", &(remaining + quantity), &remaining)
            .finish();
        if let Err(e) = self
            .ctx
            .event_sender
            .send(Event::ChangeRecorded(record))
            .await
        {
            warn!(error = %e, "Failed to send change record for mortality");
        }
        if let Err(e) = self
            .ctx
            .event_sender
            .send(Event::MortalityRecorded {
                batch_id,
                quantity,
                remaining,
            })
            .await
        {
            warn!(error = %e, "Failed to send mortality event");
        }

        Ok(remaining)
    }
}
