//! Run statistics and parsing diagnostics
//!
//! Parse failures never influence control flow; they are counted here and
//! reported in aggregate at the end of a region run.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::NaiveDate;

/// Shared diagnostic counters for field extraction and value parsing.
///
/// Uses atomics/a short-lived mutex so one instance can be shared across
/// concurrent detail workers.
#[derive(Debug, Default)]
pub struct ParseStats {
    price_failures: AtomicU64,
    area_failures: AtomicU64,
    floor_failures: AtomicU64,
    dropped_records: AtomicU64,
    field_misses: Mutex<HashMap<String, u64>>,
}

impl ParseStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_price_failure(&self) {
        self.price_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_area_failure(&self) {
        self.area_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_floor_failure(&self) {
        self.floor_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped_record(&self) {
        self.dropped_records.fetch_add(1, Ordering::Relaxed);
    }

    /// No candidate key produced a usable value for a logical field.
    pub fn record_field_miss(&self, field: &str) {
        let mut misses = self.field_misses.lock().expect("field_misses poisoned");
        *misses.entry(field.to_string()).or_insert(0) += 1;
    }

    pub fn snapshot(&self) -> ParseStatsSnapshot {
        ParseStatsSnapshot {
            price_failures: self.price_failures.load(Ordering::Relaxed),
            area_failures: self.area_failures.load(Ordering::Relaxed),
            floor_failures: self.floor_failures.load(Ordering::Relaxed),
            dropped_records: self.dropped_records.load(Ordering::Relaxed),
            field_misses: self
                .field_misses
                .lock()
                .expect("field_misses poisoned")
                .clone(),
        }
    }
}

/// Point-in-time copy of the diagnostic counters for reporting.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ParseStatsSnapshot {
    pub price_failures: u64,
    pub area_failures: u64,
    pub floor_failures: u64,
    pub dropped_records: u64,
    pub field_misses: HashMap<String, u64>,
}

impl ParseStatsSnapshot {
    pub fn total_field_misses(&self) -> u64 {
        self.field_misses.values().sum()
    }
}

/// Outcome of one region's collection + reconciliation run.
#[derive(Debug, Clone, Serialize)]
pub struct RegionRunReport {
    pub region_code: String,
    pub run_date: NaiveDate,
    pub pages_fetched: u32,
    /// Canonical records fed into the reconciliation pass.
    pub processed: u64,
    pub inserted: u64,
    pub updated: u64,
    pub unchanged: u64,
    pub deactivated: u64,
    pub price_changes: u64,
    /// Per-record storage failures that were logged and skipped.
    pub persist_failures: u64,
    /// Raw payloads rejected by the record processor (missing listing id).
    /// The counters behind this are shared by all detail workers, so in a
    /// multi-region run the value is cumulative over the process, not scoped
    /// to this region.
    pub dropped_records: u64,
    /// Cumulative parse diagnostics at the time the report was built; same
    /// process-wide scope as `dropped_records`.
    pub parse_stats: ParseStatsSnapshot,
    pub elapsed_ms: u64,
}

impl RegionRunReport {
    pub fn new(region_code: &str, run_date: NaiveDate) -> Self {
        Self {
            region_code: region_code.to_string(),
            run_date,
            pages_fetched: 0,
            processed: 0,
            inserted: 0,
            updated: 0,
            unchanged: 0,
            deactivated: 0,
            price_changes: 0,
            persist_failures: 0,
            dropped_records: 0,
            parse_stats: ParseStatsSnapshot::default(),
            elapsed_ms: 0,
        }
    }

    /// Records that made it into the store in some form.
    pub fn succeeded(&self) -> u64 {
        self.inserted + self.updated + self.unchanged
    }

    /// One-line summary used at the end of each region run.
    pub fn summary(&self) -> String {
        format!(
            "region {} ({}): {} processed ({} persisted), {} new, {} updated ({} price changes), {} unchanged, {} deactivated, {} persist failures, {} dropped",
            self.region_code,
            self.run_date,
            self.processed,
            self.succeeded(),
            self.inserted,
            self.updated,
            self.price_changes,
            self.unchanged,
            self.deactivated,
            self.persist_failures,
            self.dropped_records,
        )
    }
}
