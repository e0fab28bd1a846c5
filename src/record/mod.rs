//! Record model
//!
//! Canonical in-memory representation of an address row as it moves
//! through the pipeline:
//!
//! - `RawAddressRecord` - one spreadsheet row, produced by the extractor
//! - `ParsedAddressRecord` - raw row plus parsed components and status
//! - `EnrichedAddressRecord` - parsed row plus audit fields; the unit that
//!   is persisted and written to output artifacts
//!
//! Each stage consumes the previous record by value and wraps it, so a
//! record is never modified after the stage that produced it.

mod types;

pub use types::{
    Component, Components, EnrichedAddressRecord, ParsedAddressRecord, RawAddressRecord,
    ADDRESS_LINE_SEPARATOR,
};
