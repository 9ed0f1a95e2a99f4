//! Value parsers for localized price, area, and floor strings
//!
//! Total functions: unparseable input yields `None`, never a panic or an
//! error. `None` is deliberately distinct from zero - coercing an unknown
//! price to 0 corrupts change-percentage math downstream.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// "5억 3,000만", "5억3000", "1억", "3,000만원" - 억 is ×10,000 man-won,
/// the remainder is plain man-won. Trailing 만/원 suffixes are optional.
static KOREAN_PRICE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:(\d[\d,]*)\s*억)?\s*(?:(\d[\d,]*)\s*만?)?\s*원?\s*$").expect("valid regex")
});

fn strip_separators(s: &str) -> String {
    s.chars().filter(|c| *c != ',').collect()
}

/// Parse a price into man-won units.
///
/// Accepts numbers directly; for strings, recognizes the Korean 억/만 unit
/// combination, then falls back to bare integer and bare float parsing.
pub fn parse_price(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => {
            let v = n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f.trunc() as i64))?;
            (v >= 0).then_some(v)
        }
        Value::String(s) => parse_price_str(s),
        _ => None,
    }
}

fn parse_price_str(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "-" {
        return None;
    }

    if let Some(caps) = KOREAN_PRICE_RE.captures(trimmed) {
        let eok = caps.get(1);
        let man = caps.get(2);
        if eok.is_some() || man.is_some() {
            let eok_part = match eok {
                Some(m) => strip_separators(m.as_str()).parse::<i64>().ok()?,
                None => 0,
            };
            let man_part = match man {
                Some(m) => strip_separators(m.as_str()).parse::<i64>().ok()?,
                None => 0,
            };
            return Some(eok_part * 10_000 + man_part);
        }
    }

    let plain = strip_separators(trimmed);
    if let Ok(v) = plain.parse::<i64>() {
        return (v >= 0).then_some(v);
    }
    if let Ok(v) = plain.parse::<f64>() {
        let truncated = v.trunc() as i64;
        return (truncated >= 0).then_some(truncated);
    }
    None
}

/// Parse an area in square meters, stripping unit suffixes (㎡, m², 평).
pub fn parse_area(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => {
            let cleaned = strip_separators(s.trim())
                .trim_end_matches('㎡')
                .trim_end_matches("m²")
                .trim_end_matches("m2")
                .trim_end_matches(['평', '平'])
                .trim()
                .to_string();
            if cleaned.is_empty() || cleaned == "-" {
                return None;
            }
            cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
        }
        _ => None,
    }
}

/// Parse a floor descriptor: a leading `B` marks a basement level
/// ("B1" → -1), otherwise a plain non-negative integer. Mixed text such as
/// "5F" or "중" is unparseable.
pub fn parse_floor(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => n.as_i64().and_then(|v| i32::try_from(v).ok()),
        Value::String(s) => {
            let trimmed = s.trim();
            if let Some(rest) = trimmed.strip_prefix(['B', 'b']) {
                if !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()) {
                    return rest.parse::<i32>().ok().map(|v| -v);
                }
                return None;
            }
            if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
                return trimmed.parse::<i32>().ok();
            }
            None
        }
        _ => None,
    }
}
