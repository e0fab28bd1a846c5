//! Extractor types

use crate::error::{Error, Result};
use crate::record::RawAddressRecord;
use serde::Serialize;

/// Columns every input file must carry
pub const REQUIRED_COLUMNS: [&str; 2] = ["ID", "ADDRESSLINE1"];

/// Columns read when present
pub const OPTIONAL_COLUMNS: [&str; 2] = ["ADDRESSLINE2", "ADDRESSLINE3"];

/// Default number of rows per chunk
pub const DEFAULT_CHUNK_SIZE: usize = 5000;

/// A data row that could not become a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowRejection {
    /// 1-based data row number (header excluded)
    pub row_number: usize,
    pub reason: String,
}

/// One item yielded by a record stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractedRow {
    Record(RawAddressRecord),
    Rejected(RowRejection),
}

/// Up to `chunk_size` rows read from a file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedChunk {
    pub records: Vec<RawAddressRecord>,
    pub rejected: Vec<RowRejection>,
}

impl ExtractedChunk {
    /// Number of data rows this chunk covers
    pub fn len(&self) -> usize {
        self.records.len() + self.rejected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.rejected.is_empty()
    }

    pub(crate) fn push(&mut self, row: ExtractedRow) {
        match row {
            ExtractedRow::Record(record) => self.records.push(record),
            ExtractedRow::Rejected(rejection) => self.rejected.push(rejection),
        }
    }
}

/// Positions of the known columns within a header row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMap {
    pub id: usize,
    pub line_1: usize,
    pub line_2: Option<usize>,
    pub line_3: Option<usize>,
}

impl ColumnMap {
    /// Resolve the column positions from a header row.
    ///
    /// Returns a schema error listing every missing required column.
    pub fn from_headers(file: &str, headers: &[String]) -> Result<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().trim_start_matches('\u{feff}').eq_ignore_ascii_case(name))
        };

        let id = find(REQUIRED_COLUMNS[0]);
        let line_1 = find(REQUIRED_COLUMNS[1]);

        match (id, line_1) {
            (Some(id), Some(line_1)) => Ok(Self {
                id,
                line_1,
                line_2: find(OPTIONAL_COLUMNS[0]),
                line_3: find(OPTIONAL_COLUMNS[1]),
            }),
            _ => {
                let missing = REQUIRED_COLUMNS
                    .iter()
                    .zip([id, line_1])
                    .filter(|(_, pos)| pos.is_none())
                    .map(|(name, _)| (*name).to_string())
                    .collect();
                Err(Error::schema(file, missing))
            }
        }
    }
}
