//! Application layer
//!
//! Orchestration of collection runs: the reconciliation engine that merges
//! fresh batches against stored state, and the collection driver that walks
//! the portal API.

pub mod collector;
pub mod reconcile;

pub use collector::ListingCollector;
pub use reconcile::ReconciliationEngine;
