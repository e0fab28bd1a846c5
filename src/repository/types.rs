//! Repository types, table layout and row validation

use crate::record::{Component, EnrichedAddressRecord};
use chrono::SecondsFormat;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Default target table
pub const DEFAULT_TABLE: &str = "addresses";

/// Longest accepted `source_id`
pub const MAX_SOURCE_ID_LEN: usize = 255;

/// A persisted row as column name to text value
pub type StoredRow = BTreeMap<String, Option<String>>;

static TABLE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}(\.[A-Za-z_][A-Za-z0-9_]{0,62}){0,2}$").unwrap()
});

// ============================================================================
// Table Layout
// ============================================================================

/// How a column is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// `source_id`, the primary key
    Key,
    Text,
    Timestamp,
}

/// One column of the target table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
}

const fn text(name: &'static str) -> Column {
    Column {
        name,
        kind: ColumnKind::Text,
    }
}

/// Target table columns, in the order `row_values` produces them
pub const COLUMNS: [Column; 20] = [
    Column {
        name: "source_id",
        kind: ColumnKind::Key,
    },
    text("address_line_1"),
    text("address_line_2"),
    text("address_line_3"),
    text("full_address"),
    text("street_number"),
    text("street_name"),
    text("unit"),
    text("municipality"),
    text("province_or_state"),
    text("postal_code"),
    text("country"),
    text("orientation"),
    text("general_delivery"),
    text("parse_status"),
    text("parse_error"),
    text("filename"),
    Column {
        name: "processed_timestamp",
        kind: ColumnKind::Timestamp,
    },
    text("extracted_by"),
    text("completeness"),
];

/// Column names in table order
pub fn column_names() -> impl Iterator<Item = &'static str> {
    COLUMNS.iter().map(|c| c.name)
}

/// Text form of a record, one entry per `COLUMNS` slot.
///
/// The timestamp is RFC 3339 UTC with microseconds.
pub fn row_values(record: &EnrichedAddressRecord) -> Vec<Option<String>> {
    let raw = record.raw();
    let parsed = record.parsed();

    let mut values = Vec::with_capacity(COLUMNS.len());
    values.push(Some(raw.source_id.clone()));
    values.push(Some(raw.address_line_1.clone()));
    values.push(raw.address_line_2.clone());
    values.push(raw.address_line_3.clone());
    values.push(Some(parsed.full_address().to_string()));
    values.extend(
        Component::ALL
            .iter()
            .map(|c| parsed.component(*c).map(str::to_string)),
    );
    values.push(Some(parsed.parse_status().as_str().to_string()));
    values.push(parsed.parse_error().map(str::to_string));
    values.push(Some(record.filename().to_string()));
    values.push(Some(
        record
            .processed_timestamp()
            .to_rfc3339_opts(SecondsFormat::Micros, true),
    ));
    values.push(Some(record.extracted_by().to_string()));
    values.push(Some(record.completeness().as_str().to_string()));
    values
}

/// A record as a `StoredRow`
pub fn stored_row(record: &EnrichedAddressRecord) -> StoredRow {
    column_names()
        .map(str::to_string)
        .zip(row_values(record))
        .collect()
}

/// Whether a configured table name is a safe SQL identifier
/// (`table`, `schema.table` or `catalog.schema.table`)
pub fn is_valid_table_name(name: &str) -> bool {
    TABLE_NAME.is_match(name)
}

// ============================================================================
// Upsert Results
// ============================================================================

/// A row that was not persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowFailure {
    pub source_id: String,
    pub error: String,
}

impl RowFailure {
    pub fn new(source_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            error: error.into(),
        }
    }
}

/// Reported for every staged row that a later row with the same key
/// replaced inside one batch
pub const SUPERSEDED: &str = "duplicate source_id, superseded by a later row";

/// Outcome of one committed batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpsertResult {
    /// Keys that did not exist before the commit
    pub inserted: usize,
    /// Keys that existed and were overwritten
    pub updated: usize,
    /// Rows rejected before staging, then rows superseded by a later row
    /// with the same key
    pub failed: Vec<RowFailure>,
}

impl UpsertResult {
    /// Rows written by the commit
    pub fn persisted(&self) -> usize {
        self.inserted + self.updated
    }
}

/// Reject rows the store cannot key
pub fn validate_row(record: &EnrichedAddressRecord) -> std::result::Result<(), RowFailure> {
    let id = record.source_id();
    if id.trim().is_empty() {
        return Err(RowFailure::new(id, "empty source_id"));
    }
    if id.len() > MAX_SOURCE_ID_LEN {
        return Err(RowFailure::new(
            id,
            format!("source_id longer than {MAX_SOURCE_ID_LEN} bytes"),
        ));
    }
    Ok(())
}

/// Split a chunk into rows that can be staged and rows that cannot
pub fn partition_valid(
    records: &[EnrichedAddressRecord],
) -> (Vec<&EnrichedAddressRecord>, Vec<RowFailure>) {
    let mut valid = Vec::with_capacity(records.len());
    let mut failed = Vec::new();
    for record in records {
        match validate_row(record) {
            Ok(()) => valid.push(record),
            Err(failure) => failed.push(failure),
        }
    }
    (valid, failed)
}
