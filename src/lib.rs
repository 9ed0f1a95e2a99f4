//! Land Collector - Naver Land real-estate listing ETL pipeline
//!
//! This library collects listing data from the portal's internal JSON API,
//! normalizes heterogeneous payloads into canonical records, and reconciles
//! them against previously stored state with price-change history and a
//! grace-period soft-delete policy.

// Module declarations
pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;

pub use error::{CollectorError, CollectorResult};
