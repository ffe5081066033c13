//! Batch Relationship Graph
//!
//! Directed edges from live batches to the dressed batches they produced,
//! annotated with the birds moved across each edge. The graph owns the edge
//! rows and nothing else; both endpoints belong to the inventory ledger.
//!
//! Capacity and single-inbound checks run under the per-key entry locks, so
//! two recordings against the same source or target batch serialize.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use crate::errors::EngineError;
use crate::models::BatchRelationship;

#[derive(Default)]
pub struct RelationshipGraph {
    /// Edges keyed by source live batch.
    outgoing: DashMap<Uuid, Vec<BatchRelationship>>,
    /// The single processed-from edge keyed by target dressed batch.
    inbound: DashMap<Uuid, BatchRelationship>,
}

impl RelationshipGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a processing edge after checking, atomically, that the source
    /// batch's cumulative outgoing quantity stays within its initial count
    /// and that the target batch has no origin edge yet.
    ///
    /// A violation means the stored bookkeeping is already inconsistent,
    /// which is why both checks fail with [`EngineError::LineageViolation`].
    pub fn record_processing(
        &self,
        source_initial_count: i32,
        edge: BatchRelationship,
    ) -> Result<BatchRelationship, EngineError> {
        if edge.quantity <= 0 {
            return Err(EngineError::InvalidInput(
                "Processed quantity must be positive".to_string(),
            ));
        }

        match self.inbound.entry(edge.target_batch_id) {
            Entry::Occupied(existing) => Err(EngineError::LineageViolation(format!(
                "Dressed batch {} already has a processed-from edge (source {})",
                edge.target_batch_id,
                existing.get().source_batch_id
            ))),
            Entry::Vacant(vacant) => {
                let mut outgoing = self.outgoing.entry(edge.source_batch_id).or_default();
                let already_processed: i32 = outgoing.iter().map(|e| e.quantity).sum();
                if already_processed + edge.quantity > source_initial_count {
                    return Err(EngineError::LineageViolation(format!(
                        "Processing {} birds from batch {} exceeds its initial count {} ({} already processed out)",
                        edge.quantity,
                        edge.source_batch_id,
                        source_initial_count,
                        already_processed
                    )));
                }
                outgoing.push(edge.clone());
                vacant.insert(edge.clone());
                Ok(edge)
            }
        }
    }

    /// The single inbound edge describing a dressed batch's origin, if any.
    pub fn lineage_of(&self, dressed_batch_id: Uuid) -> Option<BatchRelationship> {
        self.inbound.get(&dressed_batch_id).map(|e| e.value().clone())
    }

    /// All outgoing edges of a live batch, oldest first.
    pub fn outgoing_of(&self, source_batch_id: Uuid) -> Vec<BatchRelationship> {
        self.outgoing
            .get(&source_batch_id)
            .map(|edges| edges.value().clone())
            .unwrap_or_default()
    }

    /// Total birds moved out of a live batch across all processing runs.
    pub fn processed_out_of(&self, source_batch_id: Uuid) -> i32 {
        self.outgoing
            .get(&source_batch_id)
            .map(|edges| edges.iter().map(|e| e.quantity).sum())
            .unwrap_or(0)
    }

    /// Compensation hook for the processing transaction: unwinds an edge
    /// whose ledger commit lost its race.
    pub(crate) fn remove_edge(&self, edge: &BatchRelationship) {
        if let Some(mut outgoing) = self.outgoing.get_mut(&edge.source_batch_id) {
            outgoing.retain(|e| e.id != edge.id);
        }
        self.inbound
            .remove_if(&edge.target_batch_id, |_, existing| existing.id == edge.id);
    }
}
