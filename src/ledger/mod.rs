//! Inventory Ledger
//!
//! Single source of truth for live and dressed batch counts, and the only
//! component allowed to mutate them. Every mutation is a check-then-act
//! executed entirely under the write lock, so concurrent mutations of the
//! same batch serialize rather than race; reads take the read lock and see
//! only fully applied transactions. Each record carries a version the
//! processing transaction commits against.

use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::EngineError;
use crate::models::{DressedBatch, InventorySource, LiveBatch};

#[derive(Default)]
struct LedgerState {
    live: HashMap<Uuid, LiveBatch>,
    dressed: HashMap<Uuid, DressedBatch>,
}

/// Owner of all batch count state.
#[derive(Default)]
pub struct InventoryLedger {
    state: RwLock<LedgerState>,
}

impl InventoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a live batch. Counts must already satisfy the batch invariants.
    pub async fn insert_live_batch(&self, batch: LiveBatch) -> Result<(), EngineError> {
        validate_live(&batch)?;
        let mut state = self.state.write().await;
        if state.live.contains_key(&batch.id) {
            return Err(EngineError::InvalidInput(format!(
                "Live batch {} already exists",
                batch.id
            )));
        }
        state.live.insert(batch.id, batch);
        Ok(())
    }

    /// Seeds a dressed batch, tolerating partially-populated records.
    pub async fn insert_dressed_batch(&self, batch: DressedBatch) -> Result<(), EngineError> {
        validate_dressed(&batch)?;
        let mut state = self.state.write().await;
        if state.dressed.contains_key(&batch.id) {
            return Err(EngineError::InvalidInput(format!(
                "Dressed batch {} already exists",
                batch.id
            )));
        }
        state.dressed.insert(batch.id, batch);
        Ok(())
    }

    /// Snapshot of a live batch.
    pub async fn live_batch(&self, batch_id: Uuid) -> Result<LiveBatch, EngineError> {
        let state = self.state.read().await;
        state
            .live
            .get(&batch_id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("Live batch {} not found", batch_id)))
    }

    /// Snapshot of a dressed batch.
    pub async fn dressed_batch(&self, batch_id: Uuid) -> Result<DressedBatch, EngineError> {
        let state = self.state.read().await;
        state
            .dressed
            .get(&batch_id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("Dressed batch {} not found", batch_id)))
    }

    /// Snapshot listing of all live batches, for display collaborators.
    pub async fn live_batches(&self) -> Vec<LiveBatch> {
        self.state.read().await.live.values().cloned().collect()
    }

    /// Snapshot listing of all dressed batches.
    pub async fn dressed_batches(&self) -> Vec<DressedBatch> {
        self.state.read().await.dressed.values().cloned().collect()
    }

    /// Units currently available from the given source.
    pub async fn available_quantity(
        &self,
        batch_id: Uuid,
        source: &InventorySource,
    ) -> Result<i32, EngineError> {
        let state = self.state.read().await;
        availability(&state, batch_id, source)
    }

    /// Reserves `quantity` units, failing without mutation when availability
    /// is insufficient. Returns the new available quantity.
    pub async fn reserve(
        &self,
        batch_id: Uuid,
        source: &InventorySource,
        quantity: i32,
    ) -> Result<i32, EngineError> {
        if quantity <= 0 {
            return Err(EngineError::InvalidInput(
                "Reservation quantity must be positive".to_string(),
            ));
        }

        let mut state = self.state.write().await;
        let available = availability(&state, batch_id, source)?;
        if quantity > available {
            return Err(EngineError::InsufficientInventory {
                requested: quantity,
                available,
            });
        }

        let now = Utc::now();
        match source {
            InventorySource::Live => {
                let batch = live_mut(&mut state, batch_id)?;
                batch.current_count -= quantity;
                batch.version += 1;
                batch.updated_at = Some(now);
                Ok(batch.current_count)
            }
            InventorySource::DressedWhole => {
                let batch = dressed_mut(&mut state, batch_id)?;
                let remaining = batch.available_whole_units() - quantity;
                batch.current_count = Some(remaining);
                batch.version += 1;
                batch.updated_at = Some(now);
                Ok(remaining)
            }
            InventorySource::DressedPart(part) => {
                let batch = dressed_mut(&mut state, batch_id)?;
                let remaining = batch.part_count(*part) - quantity;
                batch.parts_count.insert(*part, remaining);
                batch.version += 1;
                batch.updated_at = Some(now);
                Ok(remaining)
            }
        }
    }

    /// Inverse of [`reserve`](Self::reserve), used when an order is cancelled
    /// or edited downward. Whole-bird counts never climb above
    /// `initial_count`; part counts have no cap of their own.
    pub async fn release(
        &self,
        batch_id: Uuid,
        source: &InventorySource,
        quantity: i32,
    ) -> Result<i32, EngineError> {
        if quantity <= 0 {
            return Err(EngineError::InvalidInput(
                "Release quantity must be positive".to_string(),
            ));
        }

        let mut state = self.state.write().await;
        let now = Utc::now();
        match source {
            InventorySource::Live => {
                let batch = live_mut(&mut state, batch_id)?;
                batch.current_count = (batch.current_count + quantity).min(batch.initial_count);
                batch.version += 1;
                batch.updated_at = Some(now);
                Ok(batch.current_count)
            }
            InventorySource::DressedWhole => {
                let batch = dressed_mut(&mut state, batch_id)?;
                let restored = (batch.available_whole_units() + quantity).min(batch.initial_count);
                batch.current_count = Some(restored);
                batch.version += 1;
                batch.updated_at = Some(now);
                Ok(restored)
            }
            InventorySource::DressedPart(part) => {
                let batch = dressed_mut(&mut state, batch_id)?;
                let restored = batch.part_count(*part) + quantity;
                batch.parts_count.insert(*part, restored);
                batch.version += 1;
                batch.updated_at = Some(now);
                Ok(restored)
            }
        }
    }

    /// Records bird deaths on a live batch. Returns the new current count.
    pub async fn record_mortality(
        &self,
        batch_id: Uuid,
        quantity: i32,
    ) -> Result<i32, EngineError> {
        if quantity <= 0 {
            return Err(EngineError::InvalidInput(
                "Mortality quantity must be positive".to_string(),
            ));
        }

        let mut state = self.state.write().await;
        let batch = live_mut(&mut state, batch_id)?;
        if quantity > batch.current_count {
            return Err(EngineError::InsufficientInventory {
                requested: quantity,
                available: batch.current_count,
            });
        }
        batch.current_count -= quantity;
        batch.version += 1;
        batch.updated_at = Some(Utc::now());
        Ok(batch.current_count)
    }

    /// Atomically applies a processing transaction's writes: replaces the
    /// source batch, inserts the dressed batch and the optional remainder
    /// batch. Fails with `ConcurrencyConflict` when the source batch changed
    /// since the snapshot the caller built its writes from; nothing is
    /// applied on any failure.
    pub async fn commit_processing(
        &self,
        source_id: Uuid,
        expected_version: u64,
        mut updated_source: LiveBatch,
        dressed: DressedBatch,
        remainder: Option<LiveBatch>,
    ) -> Result<(), EngineError> {
        validate_dressed(&dressed)?;
        if let Some(ref rem) = remainder {
            validate_live(rem)?;
        }

        let mut state = self.state.write().await;

        let current = state.live.get(&source_id).ok_or_else(|| {
            EngineError::NotFound(format!("Live batch {} not found", source_id))
        })?;
        if current.version != expected_version {
            return Err(EngineError::ConcurrencyConflict(source_id));
        }
        if state.dressed.contains_key(&dressed.id) {
            return Err(EngineError::InvalidInput(format!(
                "Dressed batch {} already exists",
                dressed.id
            )));
        }
        if let Some(ref rem) = remainder {
            if state.live.contains_key(&rem.id) {
                return Err(EngineError::InvalidInput(format!(
                    "Live batch {} already exists",
                    rem.id
                )));
            }
        }

        updated_source.version = expected_version + 1;
        updated_source.updated_at = Some(Utc::now());
        state.live.insert(source_id, updated_source);
        state.dressed.insert(dressed.id, dressed);
        if let Some(rem) = remainder {
            state.live.insert(rem.id, rem);
        }
        Ok(())
    }
}

fn availability(
    state: &LedgerState,
    batch_id: Uuid,
    source: &InventorySource,
) -> Result<i32, EngineError> {
    match source {
        InventorySource::Live => state
            .live
            .get(&batch_id)
            .map(|b| b.current_count)
            .ok_or_else(|| EngineError::NotFound(format!("Live batch {} not found", batch_id))),
        InventorySource::DressedWhole => state
            .dressed
            .get(&batch_id)
            .map(DressedBatch::available_whole_units)
            .ok_or_else(|| EngineError::NotFound(format!("Dressed batch {} not found", batch_id))),
        InventorySource::DressedPart(part) => state
            .dressed
            .get(&batch_id)
            .map(|b| b.part_count(*part))
            .ok_or_else(|| EngineError::NotFound(format!("Dressed batch {} not found", batch_id))),
    }
}

fn live_mut(state: &mut LedgerState, batch_id: Uuid) -> Result<&mut LiveBatch, EngineError> {
    state
        .live
        .get_mut(&batch_id)
        .ok_or_else(|| EngineError::NotFound(format!("Live batch {} not found", batch_id)))
}

fn dressed_mut(state: &mut LedgerState, batch_id: Uuid) -> Result<&mut DressedBatch, EngineError> {
    state
        .dressed
        .get_mut(&batch_id)
        .ok_or_else(|| EngineError::NotFound(format!("Dressed batch {} not found", batch_id)))
}

fn validate_live(batch: &LiveBatch) -> Result<(), EngineError> {
    if batch.initial_count <= 0 {
        return Err(EngineError::InvalidInput(format!(
            "Live batch {} initial count must be positive",
            batch.batch_code
        )));
    }
    if batch.current_count < 0 || batch.current_count > batch.initial_count {
        return Err(EngineError::InvalidInput(format!(
            "Live batch {} current count {} outside [0, {}]",
            batch.batch_code, batch.current_count, batch.initial_count
        )));
    }
    Ok(())
}

fn validate_dressed(batch: &DressedBatch) -> Result<(), EngineError> {
    if batch.initial_count < 0 {
        return Err(EngineError::InvalidInput(format!(
            "Dressed batch {} initial count must not be negative",
            batch.batch_code
        )));
    }
    if let Some(current) = batch.current_count {
        if current < 0 || current > batch.initial_count {
            return Err(EngineError::InvalidInput(format!(
                "Dressed batch {} current count {} outside [0, {}]",
                batch.batch_code, current, batch.initial_count
            )));
        }
    }
    if let Some(processing_quantity) = batch.processing_quantity {
        if processing_quantity < 0 {
            return Err(EngineError::InvalidInput(format!(
                "Dressed batch {} processing quantity must not be negative",
                batch.batch_code
            )));
        }
    }
    for (part, count) in &batch.parts_count {
        if *count < 0 {
            return Err(EngineError::InvalidInput(format!(
                "Dressed batch {} has negative count for part {}",
                batch.batch_code, part
            )));
        }
    }
    Ok(())
}
