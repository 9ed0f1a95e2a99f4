//! Domain layer for real-estate listing collection
//!
//! Contains the canonical listing model, change-history records, run
//! statistics, and the storage trait the reconciliation engine depends on.

pub mod listing;
pub mod repositories;
pub mod stats;

pub use listing::{
    CanonicalListing, DeletionHistoryEntry, PriceHistoryEntry, StoredListingSnapshot, TradeType,
    GRACE_PERIOD_DAYS,
};
pub use repositories::ListingStore;
pub use stats::{ParseStats, ParseStatsSnapshot, RegionRunReport};
