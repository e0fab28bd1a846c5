//! Low-level row readers for the supported input formats

use crate::error::{Error, Result};
use calamine::{open_workbook, open_workbook_auto, Data, Range, Reader, Xlsx, XlsxError};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::mpsc::{self, SyncSender};
use tracing::debug;

/// Lazily produced data rows (header already consumed)
pub(crate) type RowSource = Box<dyn Iterator<Item = Result<Vec<String>>> + Send>;

/// Rows buffered ahead of the consumer when streaming a workbook
const SHEET_ROW_BUFFER: usize = 256;

/// Input container format, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Csv,
    /// Office Open XML workbooks, read cell by cell
    Xlsx,
    /// Legacy `.xls` and OpenDocument sheets
    Spreadsheet,
}

impl InputKind {
    /// Classify a path by its extension (case-insensitive)
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(Self::Csv),
            "xlsx" | "xlsm" => Some(Self::Xlsx),
            "xls" | "ods" => Some(Self::Spreadsheet),
            _ => None,
        }
    }
}

/// Whether the extractor can read this file
pub fn is_supported(path: &Path) -> bool {
    InputKind::from_path(path).is_some()
}

/// Open a file and return its header row and the remaining rows
pub(crate) fn open_rows(path: &Path) -> Result<(Vec<String>, RowSource)> {
    match InputKind::from_path(path) {
        Some(InputKind::Csv) => csv_rows(path),
        Some(InputKind::Xlsx) => xlsx_rows(path),
        Some(InputKind::Spreadsheet) => sheet_rows(path),
        None => Err(Error::spreadsheet(format!(
            "Unsupported input file: {}",
            path.display()
        ))),
    }
}

// ============================================================================
// CSV
// ============================================================================

fn csv_rows(path: &Path) -> Result<(Vec<String>, RowSource)> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let headers = reader.headers()?.iter().map(str::to_string).collect();
    let rows = reader.into_records().map(|record| {
        record
            .map(|r| r.iter().map(str::to_string).collect())
            .map_err(Error::from)
    });

    Ok((headers, Box::new(rows)))
}

// ============================================================================
// Spreadsheets
// ============================================================================

fn sheet_error(path: &Path, e: impl std::fmt::Display) -> Error {
    Error::spreadsheet(format!("{}: {e}", path.display()))
}

/// Stream the first worksheet of an `.xlsx` workbook.
///
/// A reader thread walks the sheet XML cell by cell and hands complete rows
/// over a bounded channel, so at most `SHEET_ROW_BUFFER` rows are held in
/// memory. Dropping the row source stops the thread at its next send.
fn xlsx_rows(path: &Path) -> Result<(Vec<String>, RowSource)> {
    let mut workbook: Xlsx<BufReader<File>> =
        open_workbook(path).map_err(|e: XlsxError| sheet_error(path, e))?;
    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| sheet_error(path, "workbook has no sheets"))?;

    let (tx, rx) = mpsc::sync_channel(SHEET_ROW_BUFFER);
    let label = path.display().to_string();
    std::thread::Builder::new()
        .name("xlsx-reader".to_string())
        .spawn(move || {
            if let Err(e) = stream_cells(&mut workbook, &sheet, &tx) {
                let _ = tx.send(Err(Error::spreadsheet(format!("{label}: {e}"))));
            }
        })?;

    let mut rows = rx.into_iter();
    let headers = first_filled_row(&mut rows)?;
    Ok((headers, Box::new(rows)))
}

/// Group the sheet's cells into rows. Missing rows between two filled ones
/// are sent as empty rows so row numbers match the sheet.
fn stream_cells(
    workbook: &mut Xlsx<BufReader<File>>,
    sheet: &str,
    tx: &SyncSender<Result<Vec<String>>>,
) -> std::result::Result<(), XlsxError> {
    let mut cells = workbook.worksheet_cells_reader(sheet)?;
    let mut current: Option<u32> = None;
    let mut row: Vec<String> = Vec::new();

    while let Some(cell) = cells.next_cell()? {
        let (row_index, column) = cell.get_position();

        if let Some(previous) = current.filter(|&previous| previous != row_index) {
            if tx.send(Ok(std::mem::take(&mut row))).is_err() {
                debug!(sheet, "Row consumer gone, stopping workbook reader");
                return Ok(());
            }
            for _ in previous + 1..row_index {
                if tx.send(Ok(Vec::new())).is_err() {
                    return Ok(());
                }
            }
        }
        current = Some(row_index);

        let column = column as usize;
        if row.len() <= column {
            row.resize(column + 1, String::new());
        }
        row[column] = cell_to_string(&Data::from(cell.get_value().clone()));
    }

    if current.is_some() {
        let _ = tx.send(Ok(row));
    }
    Ok(())
}

/// The header is the first row with any text in it
fn first_filled_row(rows: &mut impl Iterator<Item = Result<Vec<String>>>) -> Result<Vec<String>> {
    for row in rows {
        let row = row?;
        if row.iter().any(|cell| !cell.is_empty()) {
            return Ok(row);
        }
    }
    Ok(Vec::new())
}

/// `.xls` and `.ods` have no cell-level reader; the sheet is loaded once
/// and rows are rendered only as they are consumed.
fn sheet_rows(path: &Path) -> Result<(Vec<String>, RowSource)> {
    let mut workbook = open_workbook_auto(path).map_err(|e| sheet_error(path, e))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| sheet_error(path, "workbook has no sheets"))?
        .map_err(|e| sheet_error(path, e))?;

    let mut rows = RangeRows { range, next: 0 };
    let headers = first_filled_row(&mut rows)?;
    Ok((headers, Box::new(rows)))
}

/// Owning row iterator over a loaded sheet
struct RangeRows {
    range: Range<Data>,
    next: usize,
}

impl Iterator for RangeRows {
    type Item = Result<Vec<String>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.range.height() {
            return None;
        }
        let row = (0..self.range.width())
            .map(|column| {
                self.range
                    .get((self.next, column))
                    .map(cell_to_string)
                    .unwrap_or_default()
            })
            .collect();
        self.next += 1;
        Some(Ok(row))
    }
}

/// Render a cell the way a user would read it in the sheet.
///
/// Whole floats print without a fraction so numeric IDs stay stable
/// (`42.0` becomes `42`).
pub(crate) fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        other => other.to_string().trim().to_string(),
    }
}
