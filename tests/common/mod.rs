//! Shared test support: in-memory listing store with failure injection

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use land_collector_lib::domain::listing::{
    CanonicalListing, DeletionHistoryEntry, PriceHistoryEntry, StoredListingSnapshot, TradeType,
};
use land_collector_lib::domain::repositories::ListingStore;

#[derive(Debug, Clone)]
pub struct MemoryRow {
    pub region_code: String,
    pub trade_type: TradeType,
    pub sale_price: Option<i64>,
    pub deposit_price: Option<i64>,
    pub monthly_rent: Option<i64>,
    pub first_seen_date: NaiveDate,
    pub last_seen_date: NaiveDate,
    pub is_active: bool,
    pub deleted_date: Option<NaiveDate>,
}

/// In-memory `ListingStore` for reconciliation tests. Individual listing ids
/// can be marked as failing to exercise partial-batch behavior.
#[derive(Default)]
pub struct MemoryListingStore {
    pub rows: Mutex<HashMap<String, MemoryRow>>,
    pub price_history: Mutex<Vec<PriceHistoryEntry>>,
    pub deletion_history: Mutex<Vec<DeletionHistoryEntry>>,
    pub failing_ids: Mutex<HashSet<String>>,
    pub fail_snapshot_reads: AtomicBool,
}

impl MemoryListingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next snapshot reads fail, simulating a store outage at the
    /// start of a reconciliation pass.
    pub fn fail_snapshot_reads(&self) {
        self.fail_snapshot_reads.store(true, Ordering::SeqCst);
    }

    pub fn fail_writes_for(&self, listing_id: &str) {
        self.failing_ids
            .lock()
            .unwrap()
            .insert(listing_id.to_string());
    }

    /// Seed a stored listing directly, bypassing the reconciliation path.
    pub fn seed(&self, listing_id: &str, row: MemoryRow) {
        self.rows
            .lock()
            .unwrap()
            .insert(listing_id.to_string(), row);
    }

    pub fn row(&self, listing_id: &str) -> Option<MemoryRow> {
        self.rows.lock().unwrap().get(listing_id).cloned()
    }

    fn check_failure(&self, listing_id: &str) -> Result<()> {
        if self.failing_ids.lock().unwrap().contains(listing_id) {
            anyhow::bail!("injected storage failure for {listing_id}");
        }
        Ok(())
    }
}

pub fn active_row(region: &str, sale: Option<i64>, first: NaiveDate, last: NaiveDate) -> MemoryRow {
    MemoryRow {
        region_code: region.to_string(),
        trade_type: TradeType::Sale,
        sale_price: sale,
        deposit_price: None,
        monthly_rent: None,
        first_seen_date: first,
        last_seen_date: last,
        is_active: true,
        deleted_date: None,
    }
}

#[async_trait]
impl ListingStore for MemoryListingStore {
    async fn active_snapshots(&self, region_code: &str) -> Result<Vec<StoredListingSnapshot>> {
        if self.fail_snapshot_reads.load(Ordering::SeqCst) {
            anyhow::bail!("injected snapshot read failure");
        }
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .filter(|(_, row)| row.region_code == region_code && row.is_active)
            .map(|(id, row)| StoredListingSnapshot {
                listing_id: id.clone(),
                trade_type: row.trade_type,
                sale_price: row.sale_price,
                deposit_price: row.deposit_price,
                monthly_rent: row.monthly_rent,
                first_seen_date: Some(row.first_seen_date),
                last_seen_date: row.last_seen_date,
                is_active: row.is_active,
            })
            .collect())
    }

    async fn upsert_listing(&self, listing: &CanonicalListing) -> Result<bool> {
        self.check_failure(&listing.listing_id)?;
        let mut rows = self.rows.lock().unwrap();
        let existing = rows.get(&listing.listing_id);
        let is_new = existing.is_none();
        let first_seen = existing
            .map(|row| row.first_seen_date)
            .unwrap_or(listing.collected_date);
        rows.insert(
            listing.listing_id.clone(),
            MemoryRow {
                region_code: listing.region_code.clone(),
                trade_type: listing.trade_type,
                sale_price: listing.sale_price,
                deposit_price: listing.deposit_price,
                monthly_rent: listing.monthly_rent,
                first_seen_date: first_seen,
                last_seen_date: listing.last_seen_date,
                is_active: true,
                deleted_date: None,
            },
        );
        Ok(is_new)
    }

    async fn update_prices(&self, listing: &CanonicalListing, seen: NaiveDate) -> Result<()> {
        self.check_failure(&listing.listing_id)?;
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .get_mut(&listing.listing_id)
            .ok_or_else(|| anyhow::anyhow!("no such listing {}", listing.listing_id))?;
        row.trade_type = listing.trade_type;
        row.sale_price = listing.sale_price;
        row.deposit_price = listing.deposit_price;
        row.monthly_rent = listing.monthly_rent;
        row.last_seen_date = seen;
        Ok(())
    }

    async fn touch_last_seen(&self, listing_id: &str, seen: NaiveDate) -> Result<()> {
        self.check_failure(listing_id)?;
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .get_mut(listing_id)
            .ok_or_else(|| anyhow::anyhow!("no such listing {listing_id}"))?;
        row.last_seen_date = seen;
        Ok(())
    }

    async fn deactivate(&self, listing_id: &str, deleted: NaiveDate) -> Result<()> {
        self.check_failure(listing_id)?;
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .get_mut(listing_id)
            .ok_or_else(|| anyhow::anyhow!("no such listing {listing_id}"))?;
        row.is_active = false;
        row.deleted_date = Some(deleted);
        Ok(())
    }

    async fn insert_price_history(&self, entry: &PriceHistoryEntry) -> Result<()> {
        self.check_failure(&entry.listing_id)?;
        self.price_history.lock().unwrap().push(entry.clone());
        Ok(())
    }

    async fn insert_deletion_history(&self, entry: &DeletionHistoryEntry) -> Result<()> {
        self.deletion_history.lock().unwrap().push(entry.clone());
        Ok(())
    }
}
