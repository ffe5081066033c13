mod common;

use assert_matches::assert_matches;
use chrono::Utc;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use uuid::Uuid;

use common::{seed_live_batch, test_engine};
use flockledger::commands::processing::{PartYield, ProcessBatchCommand};
use flockledger::errors::EngineError;
use flockledger::models::{
    DomainWarning, DressedBatch, DressedBatchStatus, LiveBatchStatus, PartType, RelationshipKind,
};

fn process_command(source_batch_id: Uuid, quantity: i32) -> ProcessBatchCommand {
    ProcessBatchCommand {
        source_batch_id,
        quantity,
        dressed_batch_code: "DB-001".to_string(),
        average_weight_override: None,
        parts: Vec::new(),
        expiry_date: None,
        split_remainder: false,
        remainder_batch_code: None,
    }
}

fn seeded_dressed(code: &str, initial: i32, processing_quantity: Option<i32>) -> DressedBatch {
    DressedBatch {
        id: Uuid::new_v4(),
        batch_code: code.to_string(),
        initial_count: initial,
        current_count: Some(initial),
        processing_quantity,
        average_weight: dec!(1.4),
        parts_count: HashMap::new(),
        parts_weight: HashMap::new(),
        status: DressedBatchStatus::InStorage,
        expiry_date: None,
        processed_date: Utc::now(),
        updated_at: None,
        version: 1,
    }
}

#[tokio::test]
async fn processing_with_remainder_split_relabels_the_cohort() {
    let ctx = test_engine();
    let service = ctx.processing_service();
    let batch = seed_live_batch(&ctx, "LB-200", 100).await;

    let mut command = process_command(batch.id, 60);
    command.split_remainder = true;
    command.remainder_batch_code = Some("B-R".to_string());

    let outcome = service.process_batch(command).await.unwrap();

    // The source batch drains entirely: the remainder moved to "B-R".
    assert_eq!(outcome.source_batch.current_count, 0);
    assert_eq!(outcome.source_batch.status, LiveBatchStatus::Processing);

    let remainder = outcome.remainder_batch.unwrap();
    assert_eq!(remainder.batch_code, "B-R");
    assert_eq!(remainder.current_count, 40);
    assert_eq!(remainder.initial_count, 40);
    assert_eq!(
        ctx.ledger.live_batch(remainder.id).await.unwrap().current_count,
        40
    );

    assert_eq!(outcome.dressed_batch.initial_count, 60);
    assert_eq!(outcome.dressed_batch.current_count, Some(60));

    assert_eq!(
        outcome.relationship.kind,
        RelationshipKind::PartiallyProcessed
    );
    assert_eq!(outcome.relationship.quantity, 60);

    let report = service.yield_rate(outcome.dressed_batch.id).await.unwrap();
    assert_eq!(report.rate, dec!(100));
    assert!(report.warning.is_none());
}

#[tokio::test]
async fn partial_processing_without_split_keeps_the_remainder_in_place() {
    let ctx = test_engine();
    let service = ctx.processing_service();
    let batch = seed_live_batch(&ctx, "LB-201", 100).await;

    let outcome = service.process_batch(process_command(batch.id, 60)).await.unwrap();

    assert_eq!(outcome.source_batch.current_count, 40);
    assert_eq!(outcome.source_batch.status, LiveBatchStatus::Healthy);
    assert!(outcome.remainder_batch.is_none());
    assert_eq!(
        outcome.relationship.kind,
        RelationshipKind::PartiallyProcessed
    );
}

#[tokio::test]
async fn full_processing_drains_and_marks_the_source() {
    let ctx = test_engine();
    let service = ctx.processing_service();
    let batch = seed_live_batch(&ctx, "LB-202", 80).await;

    let outcome = service.process_batch(process_command(batch.id, 80)).await.unwrap();

    assert_eq!(outcome.source_batch.current_count, 0);
    assert_eq!(outcome.source_batch.status, LiveBatchStatus::Processing);
    assert_eq!(outcome.relationship.kind, RelationshipKind::FullyProcessed);
}

#[tokio::test]
async fn processing_more_than_available_fails_without_mutation() {
    let ctx = test_engine();
    let service = ctx.processing_service();
    let batch = seed_live_batch(&ctx, "LB-203", 40).await;

    let err = service
        .process_batch(process_command(batch.id, 60))
        .await
        .unwrap_err();
    assert_matches!(
        err,
        EngineError::InsufficientInventory {
            requested: 60,
            available: 40
        }
    );

    assert_eq!(ctx.ledger.live_batch(batch.id).await.unwrap().current_count, 40);
    assert!(ctx.ledger.dressed_batches().await.is_empty());
    assert_eq!(ctx.graph.processed_out_of(batch.id), 0);
}

#[tokio::test]
async fn part_counts_and_weights_must_pair() {
    let ctx = test_engine();
    let service = ctx.processing_service();
    let batch = seed_live_batch(&ctx, "LB-204", 50).await;

    let mut command = process_command(batch.id, 30);
    command.parts = vec![PartYield {
        part: PartType::Gizzard,
        count: 28,
        weight: dec!(0),
    }];
    let err = service.process_batch(command).await.unwrap_err();
    assert_matches!(err, EngineError::InvalidInput(_));

    let mut command = process_command(batch.id, 30);
    command.parts = vec![
        PartYield {
            part: PartType::Gizzard,
            count: 28,
            weight: dec!(2.1),
        },
        PartYield {
            part: PartType::Liver,
            count: 29,
            weight: dec!(1.6),
        },
    ];
    let outcome = service.process_batch(command).await.unwrap();
    assert_eq!(outcome.dressed_batch.part_count(PartType::Gizzard), 28);
    assert_eq!(
        outcome.dressed_batch.parts_weight[&PartType::Liver],
        dec!(1.6)
    );
}

#[tokio::test]
async fn lineage_capacity_is_enforced_across_edges() {
    let ctx = test_engine();
    let service = ctx.processing_service();
    let batch = seed_live_batch(&ctx, "LB-205", 100).await;

    service.process_batch(process_command(batch.id, 60)).await.unwrap();

    // Importing an edge that would push the cumulative quantity past the
    // batch's initial count is a bookkeeping violation.
    let dressed = seeded_dressed("DB-EXT", 50, Some(50));
    ctx.ledger.insert_dressed_batch(dressed.clone()).await.unwrap();
    let err = service
        .record_processing(
            batch.id,
            dressed.id,
            50,
            RelationshipKind::PartiallyProcessed,
        )
        .await
        .unwrap_err();
    assert_matches!(err, EngineError::LineageViolation(_));

    // 40 more birds still fit.
    service
        .record_processing(
            batch.id,
            dressed.id,
            40,
            RelationshipKind::PartiallyProcessed,
        )
        .await
        .unwrap();
    assert_eq!(ctx.graph.processed_out_of(batch.id), 100);
}

#[tokio::test]
async fn a_dressed_batch_keeps_a_single_origin() {
    let ctx = test_engine();
    let service = ctx.processing_service();
    let first = seed_live_batch(&ctx, "LB-206", 60).await;
    let second = seed_live_batch(&ctx, "LB-207", 60).await;

    let dressed = seeded_dressed("DB-ONE", 30, Some(30));
    ctx.ledger.insert_dressed_batch(dressed.clone()).await.unwrap();

    service
        .record_processing(first.id, dressed.id, 30, RelationshipKind::PartiallyProcessed)
        .await
        .unwrap();
    let err = service
        .record_processing(second.id, dressed.id, 30, RelationshipKind::PartiallyProcessed)
        .await
        .unwrap_err();
    assert_matches!(err, EngineError::LineageViolation(_));

    let lineage = service.lineage_of(dressed.id).unwrap();
    assert_eq!(lineage.source_batch_id, first.id);
}

#[tokio::test]
async fn inconsistent_yield_is_flagged_not_clamped() {
    let ctx = test_engine();
    let service = ctx.processing_service();
    let batch = seed_live_batch(&ctx, "LB-208", 100).await;

    // 80 dressed units booked against only 60 birds processed.
    let dressed = seeded_dressed("DB-ODD", 80, Some(80));
    ctx.ledger.insert_dressed_batch(dressed.clone()).await.unwrap();
    service
        .record_processing(batch.id, dressed.id, 60, RelationshipKind::PartiallyProcessed)
        .await
        .unwrap();

    let report = service.yield_rate(dressed.id).await.unwrap();
    assert!(report.rate > dec!(100));
    assert_matches!(
        report.warning,
        Some(DomainWarning::YieldOutOfRange { .. })
    );
}

#[tokio::test]
async fn mortality_feeds_the_headcount_accounting() {
    let ctx = test_engine();
    let service = ctx.processing_service();
    let batch = seed_live_batch(&ctx, "LB-209", 100).await;

    service.record_mortality(batch.id, 5).await.unwrap();
    service.process_batch(process_command(batch.id, 60)).await.unwrap();

    let report = service.batch_mortality(batch.id).await.unwrap();
    assert_eq!(report.initial_count, 100);
    assert_eq!(report.current_count, 35);
    assert_eq!(report.processed_out, 60);
    assert_eq!(report.mortality, 5);
}

#[tokio::test]
async fn yield_query_without_lineage_is_not_found() {
    let ctx = test_engine();
    let service = ctx.processing_service();

    let dressed = seeded_dressed("DB-LONE", 20, None);
    ctx.ledger.insert_dressed_batch(dressed.clone()).await.unwrap();

    assert!(service.lineage_of(dressed.id).is_none());
    let err = service.yield_rate(dressed.id).await.unwrap_err();
    assert_matches!(err, EngineError::NotFound(_));
}
