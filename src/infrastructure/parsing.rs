//! Payload parsing infrastructure
//!
//! Converts the portal's heterogeneous JSON payloads (live camelCase schema
//! and the legacy Korean-labeled schema, sectioned or flat) into canonical
//! listing records. All extraction is total: a value that cannot be found or
//! parsed resolves to `None` and bumps a diagnostic counter, never an error.

pub mod field_map;
pub mod record;
pub mod value;

pub use field_map::FieldMapper;
pub use record::{RawListingPayload, RecordProcessor};
pub use value::{parse_area, parse_floor, parse_price};
