//! Output module
//!
//! Writes the processed output artifact for each input file.
//!
//! # Overview
//!
//! - CSV (default): header row plus one line per record
//! - Parquet: a fixed Arrow schema mirroring the table columns
//! - XLSX: one worksheet, header row plus one row per record, saved when
//!   the artifact is finished
//!
//! Artifacts are named `<stem>_<YYYYMMDDTHHMMSSZ>.<ext>` and are removed if
//! the file they belong to is not persisted.

mod schema;
mod writer;

pub use schema::{output_schema, records_to_batch};
pub use writer::{
    output_file_name, remove_output, OutputWriter, ParquetWriter, ParquetWriterConfig,
    OUTPUT_TIMESTAMP_FORMAT,
};

#[cfg(test)]
mod tests;
