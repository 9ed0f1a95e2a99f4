//! Canonical listing model and change-history records
//!
//! A `CanonicalListing` is produced once per sighting of a listing. It is
//! mutated only through the reconciliation engine's update path and is never
//! hard-deleted: after `GRACE_PERIOD_DAYS` of consecutive absence from search
//! results it transitions to inactive with a `DeletionHistoryEntry`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Consecutive missing-from-results days tolerated before a listing is
/// presumed delisted. Absorbs transient pagination gaps and single-run
/// scrape failures while still detecting genuine removals within a bounded
/// window.
pub const GRACE_PERIOD_DAYS: i64 = 3;

/// Transaction type of a listing, mapped from the portal's trade-type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeType {
    /// 매매 (A1)
    Sale,
    /// 전세 (B1) - lump-sum deposit lease
    Jeonse,
    /// 월세 (B2)
    MonthlyRent,
    Unknown,
}

impl TradeType {
    /// Map from the portal's trade-type code ("A1", "B1", "B2").
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "A1" => Self::Sale,
            "B1" => Self::Jeonse,
            "B2" => Self::MonthlyRent,
            _ => Self::Unknown,
        }
    }

    /// Map from a Korean display label ("매매", "전세", "월세").
    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "매매" => Self::Sale,
            "전세" => Self::Jeonse,
            "월세" | "단기임대" => Self::MonthlyRent,
            _ => Self::Unknown,
        }
    }

    /// Try code first, then label. Returns `Unknown` for anything else.
    pub fn parse(value: &str) -> Self {
        match Self::from_code(value) {
            Self::Unknown => Self::from_label(value),
            known => known,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sale => "sale",
            Self::Jeonse => "jeonse",
            Self::MonthlyRent => "monthly_rent",
            Self::Unknown => "unknown",
        }
    }

    pub fn from_str_stored(value: &str) -> Self {
        match value {
            "sale" => Self::Sale,
            "jeonse" => Self::Jeonse,
            "monthly_rent" => Self::MonthlyRent,
            _ => Self::Unknown,
        }
    }
}

/// Normalized listing record produced by the record processor.
///
/// Prices are in man-won (만원) units. `listing_id` and `region_code` must
/// both be non-empty for the record to be persisted; every other field
/// degrades to `None`/default rather than rejecting the record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalListing {
    pub listing_id: String,
    pub region_code: String,
    pub trade_type: TradeType,
    pub sale_price: Option<i64>,
    pub deposit_price: Option<i64>,
    pub monthly_rent: Option<i64>,
    /// Exclusive (전용) area in square meters.
    pub exclusive_area: Option<f64>,
    /// Supply (공급) area in square meters.
    pub supply_area: Option<f64>,
    pub floor_current: Option<i32>,
    pub floor_total: Option<i32>,
    pub building_name: Option<String>,
    pub address: Option<String>,
    pub direction: Option<String>,
    pub elevator_count: Option<i32>,
    pub realtor_name: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub collected_date: NaiveDate,
    pub last_seen_date: NaiveDate,
    pub is_active: bool,
}

impl CanonicalListing {
    /// Minimal record with required identity fields; used by the record
    /// processor as the base before field mapping fills the rest in.
    pub fn new(listing_id: String, region_code: String, collected: NaiveDate) -> Self {
        Self {
            listing_id,
            region_code,
            trade_type: TradeType::Unknown,
            sale_price: None,
            deposit_price: None,
            monthly_rent: None,
            exclusive_area: None,
            supply_area: None,
            floor_current: None,
            floor_total: None,
            building_name: None,
            address: None,
            direction: None,
            elevator_count: None,
            realtor_name: None,
            description: None,
            tags: Vec::new(),
            collected_date: collected,
            last_seen_date: collected,
            is_active: true,
        }
    }

    /// Floor data is flagged inconsistent but never rejected.
    pub fn floor_consistent(&self) -> bool {
        match (self.floor_current, self.floor_total) {
            (Some(current), Some(total)) => current <= total,
            _ => true,
        }
    }

    /// Persistence invariant: both identity fields non-empty.
    pub fn is_persistable(&self) -> bool {
        !self.listing_id.trim().is_empty() && !self.region_code.trim().is_empty()
    }
}

/// Minimal stored view of a listing read back before comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredListingSnapshot {
    pub listing_id: String,
    pub trade_type: TradeType,
    pub sale_price: Option<i64>,
    pub deposit_price: Option<i64>,
    pub monthly_rent: Option<i64>,
    pub first_seen_date: Option<NaiveDate>,
    pub last_seen_date: NaiveDate,
    pub is_active: bool,
}

impl StoredListingSnapshot {
    /// Price comparison driving the update-vs-touch decision.
    pub fn prices_differ(&self, incoming: &CanonicalListing) -> bool {
        self.sale_price != incoming.sale_price
            || self.deposit_price != incoming.deposit_price
            || self.monthly_rent != incoming.monthly_rent
    }
}

/// Append-only price-change record emitted when a reconciliation pass
/// detects a sale/deposit/rent difference against the stored snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceHistoryEntry {
    pub listing_id: String,
    pub trade_type: TradeType,
    pub prev_sale_price: Option<i64>,
    pub new_sale_price: Option<i64>,
    pub prev_deposit_price: Option<i64>,
    pub new_deposit_price: Option<i64>,
    pub prev_monthly_rent: Option<i64>,
    pub new_monthly_rent: Option<i64>,
    /// Absolute delta of the first differing price field.
    pub change_amount: Option<i64>,
    /// `(new - old) / old * 100`, only when the old value was > 0.
    pub change_percent: Option<f64>,
    pub changed_date: NaiveDate,
}

impl PriceHistoryEntry {
    /// Build an entry from the stored snapshot and the incoming record,
    /// computing deltas from the first differing field (sale, deposit, rent
    /// in that order).
    pub fn from_change(
        snapshot: &StoredListingSnapshot,
        incoming: &CanonicalListing,
        changed_date: NaiveDate,
    ) -> Self {
        let delta = [
            (snapshot.sale_price, incoming.sale_price),
            (snapshot.deposit_price, incoming.deposit_price),
            (snapshot.monthly_rent, incoming.monthly_rent),
        ]
        .into_iter()
        .find(|(old, new)| old != new);

        let (change_amount, change_percent) = match delta {
            Some((Some(old), Some(new))) => {
                let amount = new - old;
                let percent = if old > 0 {
                    Some((amount as f64 / old as f64) * 100.0)
                } else {
                    None
                };
                (Some(amount), percent)
            }
            // Appearing or disappearing price: no meaningful delta.
            _ => (None, None),
        };

        Self {
            listing_id: incoming.listing_id.clone(),
            trade_type: incoming.trade_type,
            prev_sale_price: snapshot.sale_price,
            new_sale_price: incoming.sale_price,
            prev_deposit_price: snapshot.deposit_price,
            new_deposit_price: incoming.deposit_price,
            prev_monthly_rent: snapshot.monthly_rent,
            new_monthly_rent: incoming.monthly_rent,
            change_amount,
            change_percent,
            changed_date,
        }
    }
}

/// Append-only record written when a listing crosses the grace-period
/// threshold of consecutive absence and is soft-deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletionHistoryEntry {
    pub listing_id: String,
    pub region_code: String,
    pub deleted_date: NaiveDate,
    pub deletion_reason: String,
    /// Days between first collection and deletion, when derivable.
    pub days_active: Option<i64>,
    pub last_sale_price: Option<i64>,
    pub last_monthly_rent: Option<i64>,
    pub trade_type: TradeType,
}

impl DeletionHistoryEntry {
    pub fn grace_period_expiry(
        snapshot: &StoredListingSnapshot,
        region_code: &str,
        deleted_date: NaiveDate,
    ) -> Self {
        Self {
            listing_id: snapshot.listing_id.clone(),
            region_code: region_code.to_string(),
            deleted_date,
            deletion_reason: "not_found_after_grace_period".to_string(),
            days_active: snapshot
                .first_seen_date
                .map(|first| (deleted_date - first).num_days()),
            last_sale_price: snapshot.sale_price,
            last_monthly_rent: snapshot.monthly_rent,
            trade_type: snapshot.trade_type,
        }
    }
}
