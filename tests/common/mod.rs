#![allow(dead_code)]

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

use flockledger::commands::orders::CreateOrderCommand;
use flockledger::config::EngineConfig;
use flockledger::events::{process_events, EventSender};
use flockledger::models::{CalculationMode, InventorySource, LiveBatch};
use flockledger::EngineContext;

/// Engine wired to a default config with a draining event consumer.
pub fn test_engine() -> Arc<EngineContext> {
    let config = EngineConfig::default();
    let (sender, rx) = EventSender::channel(config.event_buffer_size);
    tokio::spawn(process_events(rx));
    Arc::new(EngineContext::new(config, sender))
}

pub async fn seed_live_batch(ctx: &EngineContext, code: &str, count: i32) -> LiveBatch {
    let batch = LiveBatch::new(code, count, dec!(2.0));
    ctx.ledger
        .insert_live_batch(batch.clone())
        .await
        .expect("seed live batch");
    batch
}

/// A count-times-price order draft against live inventory.
pub fn count_price_order(customer: &str, count: i32, price: Decimal) -> CreateOrderCommand {
    CreateOrderCommand {
        customer_name: customer.to_string(),
        order_date: Utc::now(),
        quantity_count: Some(count),
        unit_size: None,
        unit_price: Some(price),
        amount_paid: Decimal::ZERO,
        calculation_mode: CalculationMode::CountTimesPrice,
        inventory_source: InventorySource::Live,
        source_batch_id: None,
        notes: None,
    }
}

/// A size-times-price order draft with no inventory reference.
pub fn size_price_order(customer: &str, size: Decimal, price: Decimal) -> CreateOrderCommand {
    CreateOrderCommand {
        customer_name: customer.to_string(),
        order_date: Utc::now(),
        quantity_count: None,
        unit_size: Some(size),
        unit_price: Some(price),
        amount_paid: Decimal::ZERO,
        calculation_mode: CalculationMode::SizeTimesPrice,
        inventory_source: InventorySource::Live,
        source_batch_id: None,
        notes: None,
    }
}
