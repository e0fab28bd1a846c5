//! File discovery and chunked record streaming

use super::reader::{self, RowSource};
use super::types::{ColumnMap, ExtractedChunk, ExtractedRow, RowRejection, DEFAULT_CHUNK_SIZE};
use crate::error::{Error, Result};
use crate::record::RawAddressRecord;
use crate::types::OptionStringExt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Reads address rows out of the input directory
#[derive(Debug, Clone)]
pub struct Extractor {
    input_dir: PathBuf,
    chunk_size: usize,
}

impl Extractor {
    /// Create an extractor for a directory
    pub fn new(input_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Set the number of rows per chunk (minimum 1)
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn input_dir(&self) -> &Path {
        &self.input_dir
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// List supported input files, sorted by name.
    ///
    /// Hidden files and Office lock files (`~$...`) are skipped.
    pub fn discover(&self) -> Result<Vec<PathBuf>> {
        if !self.input_dir.is_dir() {
            return Err(Error::FileNotFound {
                path: self.input_dir.display().to_string(),
            });
        }

        let mut files = Vec::new();
        for entry in fs::read_dir(&self.input_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }

            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name.starts_with('.') || name.starts_with("~$") {
                continue;
            }
            if reader::is_supported(&path) {
                files.push(path);
            }
        }

        files.sort();
        debug!(dir = %self.input_dir.display(), count = files.len(), "Discovered input files");
        Ok(files)
    }

    /// Open a file for streaming. Each call starts from the first data row.
    ///
    /// Header validation happens here, so a file missing a required column
    /// fails before any row is read.
    pub fn open(&self, path: &Path) -> Result<RecordStream> {
        let file = path.display().to_string();
        let (headers, rows) = reader::open_rows(path)?;
        let columns = ColumnMap::from_headers(&file, &headers)?;

        debug!(file = %file, ?columns, "Opened input file");

        Ok(RecordStream {
            file,
            columns,
            rows,
            chunk_size: self.chunk_size,
            row_number: 0,
            done: false,
        })
    }
}

// ============================================================================
// Record Stream
// ============================================================================

/// Lazy, finite stream of rows from one input file
pub struct RecordStream {
    file: String,
    columns: ColumnMap,
    rows: RowSource,
    chunk_size: usize,
    row_number: usize,
    done: bool,
}

impl std::fmt::Debug for RecordStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStream")
            .field("file", &self.file)
            .field("columns", &self.columns)
            .field("chunk_size", &self.chunk_size)
            .field("row_number", &self.row_number)
            .finish_non_exhaustive()
    }
}

impl RecordStream {
    /// Path of the file being read
    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn columns(&self) -> ColumnMap {
        self.columns
    }

    /// Read the next chunk of up to `chunk_size` rows.
    ///
    /// Returns `Ok(None)` once the file is exhausted.
    pub fn next_chunk(&mut self) -> Result<Option<ExtractedChunk>> {
        let mut chunk = ExtractedChunk::default();
        while chunk.len() < self.chunk_size {
            match self.next() {
                Some(row) => chunk.push(row?),
                None => break,
            }
        }

        Ok((!chunk.is_empty()).then_some(chunk))
    }

    fn to_row(&self, cells: Vec<String>) -> ExtractedRow {
        let cell = |idx: Option<usize>| {
            idx.and_then(|i| cells.get(i))
                .cloned()
                .none_if_blank()
        };

        let Some(source_id) = cell(Some(self.columns.id)) else {
            return ExtractedRow::Rejected(RowRejection {
                row_number: self.row_number,
                reason: "empty ID".to_string(),
            });
        };

        ExtractedRow::Record(RawAddressRecord {
            source_id,
            address_line_1: cell(Some(self.columns.line_1)).unwrap_or_default(),
            address_line_2: cell(self.columns.line_2),
            address_line_3: cell(self.columns.line_3),
            origin_file: self.file.clone(),
            row_number: self.row_number,
        })
    }
}

impl Iterator for RecordStream {
    type Item = Result<ExtractedRow>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            let cells = match self.rows.next() {
                Some(Ok(cells)) => cells,
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                None => {
                    self.done = true;
                    return None;
                }
            };

            self.row_number += 1;
            if cells.iter().all(|c| c.trim().is_empty()) {
                continue;
            }
            return Some(Ok(self.to_row(cells)));
        }
    }
}
