//! Logical-field to source-key alias mapping
//!
//! The portal has shipped at least two payload schemas: the live API's
//! English camelCase keys and a legacy Korean-labeled export. The mapper
//! consults a data-driven alias table so new schema variants only require a
//! table entry, not new lookup code.

use serde_json::Value;
use std::sync::Arc;

use crate::domain::stats::ParseStats;
use crate::infrastructure::parsing::record::RawListingPayload;

/// Ordered alias table: logical field name to candidate source keys,
/// highest priority first. Live camelCase keys lead, abbreviated list-item
/// keys next, legacy Korean labels last.
pub const FIELD_ALIASES: &[(&str, &[&str])] = &[
    ("listing_id", &["articleNo", "atclNo", "매물번호"]),
    ("listing_name", &["articleName", "atclNm", "매물명"]),
    ("region_code", &["cortarNo", "법정동코드"]),
    ("trade_type_code", &["tradeTypeCode", "tradTpCd"]),
    ("trade_type_name", &["tradeTypeName", "tradTpNm", "거래유형", "거래구분"]),
    ("sale_price", &["dealPrice", "prc", "매매가"]),
    ("deposit_price", &["warrantPrice", "dealOrWarrantPrc", "보증금"]),
    ("monthly_rent", &["rentPrice", "rentPrc", "월세"]),
    ("exclusive_area", &["exclusiveSpace", "spc2", "전용면적"]),
    ("supply_area", &["supplySpace", "spc1", "공급면적"]),
    ("floor_current", &["correspondingFloorCount", "flrInfo", "해당층"]),
    ("floor_total", &["totalFloorCount", "총층"]),
    ("direction", &["direction", "방향"]),
    ("building_name", &["buildingName", "bildNm", "동"]),
    ("address", &["exposureAddress", "detailAddress", "주소"]),
    ("elevator_count", &["elevatorCount", "승강기"]),
    ("realtor_name", &["realtorName", "rltrNm", "중개사무소"]),
    ("description", &["detailDescription", "articleFeatureDesc", "특징"]),
    ("tags", &["tagList", "태그"]),
];

/// Resolves logical fields against a raw payload, first usable candidate
/// wins. Lookup failures bump a per-field diagnostic counter and resolve to
/// `None`; no error ever escapes.
#[derive(Clone)]
pub struct FieldMapper {
    stats: Arc<ParseStats>,
}

impl FieldMapper {
    pub fn new(stats: Arc<ParseStats>) -> Self {
        Self { stats }
    }

    fn aliases(field: &str) -> &'static [&'static str] {
        FIELD_ALIASES
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, keys)| *keys)
            .unwrap_or(&[])
    }

    /// First present, non-null, non-empty value among the field's candidate
    /// keys, searched across all payload sections in priority order.
    pub fn extract(&self, payload: &RawListingPayload, field: &str) -> Option<Value> {
        for key in Self::aliases(field) {
            for section in payload.sections() {
                if let Some(found) = section.get(key) {
                    if Self::usable(found) {
                        return Some(found.clone());
                    }
                }
            }
        }
        self.stats.record_field_miss(field);
        None
    }

    /// Like [`extract`](Self::extract), but restricted to one named section.
    /// Used for cross-fill decisions where the source section matters.
    pub fn extract_from_section(
        &self,
        payload: &RawListingPayload,
        section: &str,
        field: &str,
    ) -> Option<Value> {
        let section = payload.section(section)?;
        Self::aliases(field)
            .iter()
            .filter_map(|key| section.get(*key))
            .find(|v| Self::usable(v))
            .cloned()
    }

    /// String convenience accessor; trims and drops empty results.
    pub fn extract_string(&self, payload: &RawListingPayload, field: &str) -> Option<String> {
        match self.extract(payload, field)? {
            Value::String(s) => {
                let trimmed = s.trim().to_string();
                (!trimmed.is_empty()).then_some(trimmed)
            }
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    fn usable(value: &Value) -> bool {
        match value {
            Value::Null => false,
            Value::String(s) => !s.trim().is_empty(),
            _ => true,
        }
    }
}
