//! Record processor: raw payload to canonical listing
//!
//! Permissive by design - the only rejection is a missing listing id.
//! Everything else degrades to `None`/default, because a partial record is
//! worth more than a dropped one.

use chrono::NaiveDate;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::listing::{CanonicalListing, TradeType};
use crate::domain::stats::ParseStats;
use crate::infrastructure::parsing::field_map::FieldMapper;
use crate::infrastructure::parsing::value::{parse_area, parse_floor, parse_price};

/// Named payload sections of the detail endpoint, in lookup priority order.
const SECTIONS: &[&str] = &[
    "articleDetail",
    "articlePrice",
    "articleSpace",
    "articleFloor",
    "articleFacility",
    "articleRealtor",
    "articleTax",
    "articleAddition",
    "articlePhotos",
];

/// Raw detail-endpoint payload. The live API nests data in named sections;
/// the legacy export is flat. `sections()` yields the present sections and
/// then the root object, so both shapes resolve through the same lookup.
#[derive(Debug, Clone)]
pub struct RawListingPayload(Value);

impl RawListingPayload {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn section(&self, name: &str) -> Option<&Value> {
        self.0.get(name).filter(|v| v.is_object())
    }

    pub fn sections(&self) -> impl Iterator<Item = &Value> {
        SECTIONS
            .iter()
            .filter_map(|name| self.section(name))
            .chain(std::iter::once(&self.0))
    }
}

/// Builds one `CanonicalListing` per raw payload, applying the field mapper
/// and the value parsers across all logical fields.
#[derive(Clone)]
pub struct RecordProcessor {
    mapper: FieldMapper,
    stats: Arc<ParseStats>,
}

impl RecordProcessor {
    pub fn new(stats: Arc<ParseStats>) -> Self {
        Self {
            mapper: FieldMapper::new(stats.clone()),
            stats,
        }
    }

    pub fn stats(&self) -> &Arc<ParseStats> {
        &self.stats
    }

    /// Produce a canonical record, or `None` when no listing id can be
    /// recovered under any alias (the single rejection case).
    pub fn process(
        &self,
        payload: &RawListingPayload,
        region_code: &str,
        collected: NaiveDate,
    ) -> Option<CanonicalListing> {
        let listing_id = match self.mapper.extract_string(payload, "listing_id") {
            Some(id) => id,
            None => {
                self.stats.record_dropped_record();
                debug!("dropping payload without a recognizable listing id");
                return None;
            }
        };
        if region_code.trim().is_empty() {
            self.stats.record_dropped_record();
            warn!(listing_id, "dropping record: empty region code");
            return None;
        }

        let mut listing =
            CanonicalListing::new(listing_id, region_code.to_string(), collected);

        listing.sale_price = self.price_field(payload, "sale_price");
        listing.deposit_price = self.price_field(payload, "deposit_price");
        listing.monthly_rent = self.price_field(payload, "monthly_rent");
        listing.trade_type = self.resolve_trade_type(payload, &listing);

        listing.exclusive_area = self.area_field(payload, "exclusive_area");
        listing.supply_area = self.area_field(payload, "supply_area");

        listing.floor_current = self.floor_field(payload, "floor_current");
        listing.floor_total = self.floor_field(payload, "floor_total");
        if !listing.floor_consistent() {
            warn!(
                listing_id = %listing.listing_id,
                current = ?listing.floor_current,
                total = ?listing.floor_total,
                "inconsistent floor data, keeping record"
            );
        }

        listing.building_name = self.mapper.extract_string(payload, "building_name");
        listing.address = self.mapper.extract_string(payload, "address");
        listing.realtor_name = self.mapper.extract_string(payload, "realtor_name");
        listing.description = self.mapper.extract_string(payload, "description");

        // Cross-fill: direction and elevator count live in the facility
        // section on newer payloads; the general lookup already falls back
        // there, the section-scoped pass covers payloads where the detail
        // section carries an empty placeholder.
        listing.direction = self
            .mapper
            .extract_string(payload, "direction")
            .or_else(|| {
                self.mapper
                    .extract_from_section(payload, "articleFacility", "direction")
                    .and_then(|v| v.as_str().map(|s| s.trim().to_string()))
            });
        listing.elevator_count = self
            .mapper
            .extract(payload, "elevator_count")
            .and_then(|v| parse_floor(&v).filter(|n| *n >= 0));

        listing.tags = self
            .mapper
            .extract(payload, "tags")
            .and_then(|v| match v {
                Value::Array(items) => Some(
                    items
                        .into_iter()
                        .filter_map(|item| item.as_str().map(|s| s.to_string()))
                        .collect(),
                ),
                _ => None,
            })
            .unwrap_or_default();

        Some(listing)
    }

    fn price_field(&self, payload: &RawListingPayload, field: &str) -> Option<i64> {
        let raw = self.mapper.extract(payload, field)?;
        let parsed = parse_price(&raw);
        if parsed.is_none() {
            self.stats.record_price_failure();
            debug!(field, value = %raw, "unparseable price value");
        }
        parsed
    }

    fn area_field(&self, payload: &RawListingPayload, field: &str) -> Option<f64> {
        let raw = self.mapper.extract(payload, field)?;
        let parsed = parse_area(&raw).filter(|v| *v > 0.0);
        if parsed.is_none() {
            self.stats.record_area_failure();
            debug!(field, value = %raw, "unparseable area value");
        }
        parsed
    }

    fn floor_field(&self, payload: &RawListingPayload, field: &str) -> Option<i32> {
        let raw = self.mapper.extract(payload, field)?;
        let parsed = parse_floor(&raw);
        if parsed.is_none() {
            self.stats.record_floor_failure();
            debug!(field, value = %raw, "unparseable floor value");
        }
        parsed
    }

    /// Explicit trade-type code wins, then the display label; when neither
    /// is present the type is inferred from which price fields survived
    /// parsing.
    fn resolve_trade_type(
        &self,
        payload: &RawListingPayload,
        listing: &CanonicalListing,
    ) -> TradeType {
        if let Some(code) = self.mapper.extract_string(payload, "trade_type_code") {
            let parsed = TradeType::from_code(&code);
            if parsed != TradeType::Unknown {
                return parsed;
            }
        }
        if let Some(label) = self.mapper.extract_string(payload, "trade_type_name") {
            let parsed = TradeType::from_label(&label);
            if parsed != TradeType::Unknown {
                return parsed;
            }
        }
        match (
            listing.sale_price,
            listing.deposit_price,
            listing.monthly_rent,
        ) {
            (Some(_), _, _) => TradeType::Sale,
            (None, Some(_), Some(rent)) if rent > 0 => TradeType::MonthlyRent,
            (None, Some(_), _) => TradeType::Jeonse,
            (None, None, Some(rent)) if rent > 0 => TradeType::MonthlyRent,
            _ => TradeType::Unknown,
        }
    }
}
