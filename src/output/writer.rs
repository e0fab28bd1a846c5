//! Output artifact writers
//!
//! One artifact per input file, named `<stem>_<YYYYMMDDTHHMMSSZ>.<ext>`,
//! one row per enriched record with the table's columns. Written chunk by
//! chunk; removed again if the file does not reach `PERSISTED`.

use super::schema::{output_schema, records_to_batch};
use crate::error::{Error, Result};
use crate::record::EnrichedAddressRecord;
use crate::repository::{column_names, row_values};
use crate::types::OutputFormat;
use arrow::datatypes::Schema;
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use rust_xlsxwriter::{Workbook, XlsxError};
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Timestamp suffix of output artifact names
pub const OUTPUT_TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Artifact file name for an input file
pub fn output_file_name(source: &Path, format: OutputFormat, at: DateTime<Utc>) -> String {
    let stem = source
        .file_stem()
        .map_or_else(|| "output".into(), |s| s.to_string_lossy());
    format!(
        "{stem}_{}.{}",
        at.format(OUTPUT_TIMESTAMP_FORMAT),
        format.extension()
    )
}

// ============================================================================
// Parquet
// ============================================================================

/// Configuration for Parquet writer
#[derive(Debug, Clone)]
pub struct ParquetWriterConfig {
    compression: Compression,
    row_group_size: usize,
    dictionary_enabled: bool,
}

impl Default for ParquetWriterConfig {
    fn default() -> Self {
        Self {
            compression: Compression::SNAPPY,
            row_group_size: 64 * 1024,
            dictionary_enabled: true,
        }
    }
}

impl ParquetWriterConfig {
    fn build_properties(&self) -> WriterProperties {
        WriterProperties::builder()
            .set_compression(self.compression)
            .set_max_row_group_size(self.row_group_size)
            .set_dictionary_enabled(self.dictionary_enabled)
            .build()
    }
}

/// Parquet file writer
pub struct ParquetWriter {
    writer: ArrowWriter<File>,
    rows_written: usize,
}

impl ParquetWriter {
    /// Create a Parquet writer over an already created file
    pub fn new(file: File, schema: &Schema, config: &ParquetWriterConfig) -> Result<Self> {
        let props = config.build_properties();
        let writer = ArrowWriter::try_new(file, Arc::new(schema.clone()), Some(props))
            .map_err(|e| Error::output(format!("Failed to create Parquet writer: {e}")))?;

        Ok(Self {
            writer,
            rows_written: 0,
        })
    }

    /// Write a RecordBatch to the file
    pub fn write(&mut self, batch: &RecordBatch) -> Result<()> {
        self.writer
            .write(batch)
            .map_err(|e| Error::output(format!("Failed to write batch: {e}")))?;
        self.rows_written += batch.num_rows();
        Ok(())
    }

    /// Close the writer and finalize the file
    pub fn close(self) -> Result<usize> {
        let rows = self.rows_written;
        self.writer
            .close()
            .map_err(|e| Error::output(format!("Failed to close Parquet writer: {e}")))?;
        Ok(rows)
    }
}

// ============================================================================
// XLSX
// ============================================================================

/// Last zero-based row index an Excel worksheet can hold
const XLSX_MAX_ROW: u32 = 1_048_575;

fn xlsx_error(e: XlsxError) -> Error {
    Error::output(format!("XLSX artifact: {e}"))
}

/// Workbook built in memory and saved on `finish`
struct XlsxSink {
    workbook: Workbook,
    next_row: u32,
}

impl XlsxSink {
    fn new() -> Result<Self> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        for (col, name) in column_names().enumerate() {
            sheet.write_string(0, col as u16, name).map_err(xlsx_error)?;
        }
        Ok(Self {
            workbook,
            next_row: 1,
        })
    }

    fn write(&mut self, records: &[EnrichedAddressRecord]) -> Result<()> {
        let sheet = self.workbook.worksheet_from_index(0).map_err(xlsx_error)?;
        for record in records {
            if self.next_row > XLSX_MAX_ROW {
                return Err(Error::output(format!(
                    "XLSX artifact is limited to {XLSX_MAX_ROW} rows"
                )));
            }
            for (col, value) in row_values(record).iter().enumerate() {
                if let Some(value) = value {
                    sheet
                        .write_string(self.next_row, col as u16, value.as_str())
                        .map_err(xlsx_error)?;
                }
            }
            self.next_row += 1;
        }
        Ok(())
    }

    fn save(mut self, path: &Path) -> Result<()> {
        self.workbook.save(path).map_err(xlsx_error)
    }
}

// ============================================================================
// Artifact Writer
// ============================================================================

enum Sink {
    Csv(csv::Writer<File>),
    Parquet(ParquetWriter),
    Xlsx(XlsxSink),
}

/// Writer for one output artifact
pub struct OutputWriter {
    path: PathBuf,
    sink: Sink,
    rows_written: usize,
}

impl std::fmt::Debug for OutputWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputWriter")
            .field("path", &self.path)
            .field("rows_written", &self.rows_written)
            .finish_non_exhaustive()
    }
}

impl OutputWriter {
    /// Create the artifact for `source` in `dir`.
    ///
    /// Never overwrites: if the name is taken, `_<n>` is appended to the stem.
    pub fn create(
        dir: &Path,
        source: &Path,
        format: OutputFormat,
        at: DateTime<Utc>,
    ) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .map_err(|e| Error::output(format!("Failed to create {}: {e}", dir.display())))?;

        let name = output_file_name(source, format, at);
        let (path, file) = create_unique(dir, &name)?;

        let sink = match format {
            OutputFormat::Csv => {
                let mut writer = csv::Writer::from_writer(file);
                writer.write_record(column_names())?;
                Sink::Csv(writer)
            }
            OutputFormat::Parquet => Sink::Parquet(ParquetWriter::new(
                file,
                output_schema().as_ref(),
                &ParquetWriterConfig::default(),
            )?),
            // The claimed file stays empty until the workbook is saved
            OutputFormat::Xlsx => Sink::Xlsx(XlsxSink::new()?),
        };

        debug!(path = %path.display(), "Created output artifact");
        Ok(Self {
            path,
            sink,
            rows_written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    /// Append a chunk of records
    pub fn write(&mut self, records: &[EnrichedAddressRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        match &mut self.sink {
            Sink::Csv(writer) => {
                for record in records {
                    let values = row_values(record);
                    writer.write_record(values.iter().map(|v| v.as_deref().unwrap_or("")))?;
                }
            }
            Sink::Parquet(writer) => writer.write(&records_to_batch(records)?)?,
            Sink::Xlsx(sink) => sink.write(records)?,
        }
        self.rows_written += records.len();
        Ok(())
    }

    /// Flush and close the artifact, returning its path
    pub fn finish(self) -> Result<PathBuf> {
        match self.sink {
            Sink::Csv(mut writer) => writer
                .flush()
                .map_err(|e| Error::output(format!("Failed to flush CSV output: {e}")))?,
            Sink::Parquet(writer) => {
                writer.close()?;
            }
            Sink::Xlsx(sink) => sink.save(&self.path)?,
        }
        debug!(path = %self.path.display(), rows = self.rows_written, "Finished output artifact");
        Ok(self.path)
    }

    /// Close and delete a partially written artifact
    pub fn discard(self) {
        let path = self.path;
        drop(self.sink);
        remove_output(&path);
    }
}

/// Delete an artifact, logging rather than failing
pub fn remove_output(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "Removed output artifact"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove output artifact"),
    }
}

fn create_unique(dir: &Path, name: &str) -> Result<(PathBuf, File)> {
    let candidate = Path::new(name);
    let stem = candidate
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = candidate
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut n = 0usize;
    loop {
        let file_name = if n == 0 {
            name.to_string()
        } else {
            format!("{stem}_{n}{ext}")
        };
        let path = dir.join(file_name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => n += 1,
            Err(e) => {
                return Err(Error::output(format!(
                    "Failed to create {}: {e}",
                    path.display()
                )))
            }
        }
    }
}
