//! Flockledger
//!
//! Batch lifecycle and order reconciliation engine for poultry farm
//! operations: live-bird batches are sold, die, or are processed into
//! dressed-chicken batches; customer orders draw against both pools while
//! accruing payments. This crate is the headless core — presentation and
//! persistence collaborators call the services and durably store what they
//! return.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod audit;
pub mod calc;
pub mod commands;
pub mod config;
pub mod errors;
pub mod events;
pub mod graph;
pub mod ledger;
pub mod logging;
pub mod models;
pub mod services;

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::events::EventSender;
use crate::graph::RelationshipGraph;
use crate::ledger::InventoryLedger;
use crate::services::orders::{OrderService, OrderStore};
use crate::services::processing::ProcessingService;

/// Dependency bundle every engine operation executes against.
///
/// The ledger, graph, and order store are injected rather than ambient, so
/// the engine runs under tests with no UI or storage harness attached.
#[derive(Clone)]
pub struct EngineContext {
    pub config: EngineConfig,
    pub ledger: Arc<InventoryLedger>,
    pub graph: Arc<RelationshipGraph>,
    pub orders: Arc<OrderStore>,
    pub event_sender: Arc<EventSender>,
}

impl EngineContext {
    /// Wires an empty engine from configuration and an event channel.
    pub fn new(config: EngineConfig, event_sender: EventSender) -> Self {
        Self {
            config,
            ledger: Arc::new(InventoryLedger::new()),
            graph: Arc::new(RelationshipGraph::new()),
            orders: Arc::new(OrderStore::new()),
            event_sender: Arc::new(event_sender),
        }
    }

    pub fn order_service(self: &Arc<Self>) -> OrderService {
        OrderService::new(self.clone())
    }

    pub fn processing_service(self: &Arc<Self>) -> ProcessingService {
        ProcessingService::new(self.clone())
    }
}
