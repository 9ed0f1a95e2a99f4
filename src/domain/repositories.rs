//! Repository interface for listing storage
//!
//! The store is treated as an auto-committing key-based upsert/query
//! collaborator: every method commits independently and no multi-statement
//! transaction is assumed. A failure from `active_snapshots` aborts the
//! region pass; failures from per-record writes are handled by the caller
//! (logged, counted, batch continues).

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::listing::{
    CanonicalListing, DeletionHistoryEntry, PriceHistoryEntry, StoredListingSnapshot,
};

#[async_trait]
pub trait ListingStore: Send + Sync {
    /// All active snapshots for a region, read at the start of a
    /// reconciliation pass.
    async fn active_snapshots(&self, region_code: &str) -> Result<Vec<StoredListingSnapshot>>;

    /// Idempotent upsert keyed on `listing_id`. Returns `true` when the
    /// listing was newly inserted, `false` when an existing row (possibly
    /// inactive) was revived/overwritten.
    async fn upsert_listing(&self, listing: &CanonicalListing) -> Result<bool>;

    /// Update price fields and `last_seen_date` together for one listing.
    async fn update_prices(&self, listing: &CanonicalListing, seen: NaiveDate) -> Result<()>;

    /// Refresh `last_seen_date` only (prices unchanged).
    async fn touch_last_seen(&self, listing_id: &str, seen: NaiveDate) -> Result<()>;

    /// Soft delete: mark inactive and stamp the deletion date.
    async fn deactivate(&self, listing_id: &str, deleted: NaiveDate) -> Result<()>;

    async fn insert_price_history(&self, entry: &PriceHistoryEntry) -> Result<()>;

    async fn insert_deletion_history(&self, entry: &DeletionHistoryEntry) -> Result<()>;
}
