//! Extractor
//!
//! Discovers input files and streams their rows as `RawAddressRecord`s.
//!
//! Supported inputs:
//! - CSV (streamed row by row through the `csv` crate)
//! - XLSX / XLSM / XLS / ODS (first worksheet, decoded through `calamine`)
//!
//! Headers are matched case-insensitively. `ID` and `ADDRESSLINE1` are
//! required, `ADDRESSLINE2` and `ADDRESSLINE3` are optional. Rows with an
//! empty `ID` are reported as rejections instead of failing the file.

mod extractor;
mod reader;
mod types;

pub use extractor::{Extractor, RecordStream};
pub use reader::{is_supported, InputKind};
pub use types::{
    ColumnMap, ExtractedChunk, ExtractedRow, RowRejection, DEFAULT_CHUNK_SIZE, OPTIONAL_COLUMNS,
    REQUIRED_COLUMNS,
};

#[cfg(test)]
mod tests;
