//! Tests for the extractor

use super::reader::cell_to_string;
use super::*;
use crate::error::Error;
use calamine::Data;
use pretty_assertions::assert_eq;
use rust_xlsxwriter::Workbook;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use test_case::test_case;

fn write(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

// ============================================================================
// Discovery Tests
// ============================================================================

#[test]
fn test_discover_filters_and_sorts() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "b.csv", "ID,ADDRESSLINE1\n");
    write(dir.path(), "a.XLSX", "");
    write(dir.path(), "notes.txt", "");
    write(dir.path(), ".hidden.csv", "");
    write(dir.path(), "~$a.xlsx", "");
    fs::create_dir(dir.path().join("sub.csv")).unwrap();

    let files = Extractor::new(dir.path()).discover().unwrap();
    let names: Vec<_> = files
        .iter()
        .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["a.XLSX", "b.csv"]);
}

#[test]
fn test_discover_missing_dir() {
    let err = Extractor::new("/definitely/not/here").discover().unwrap_err();
    assert!(matches!(err, Error::FileNotFound { .. }));
}

#[test_case("x.csv", true; "csv")]
#[test_case("x.xlsx", true; "xlsx")]
#[test_case("x.XLS", true; "xls upper")]
#[test_case("x.ods", true; "ods")]
#[test_case("x.json", false; "json")]
#[test_case("x", false; "no extension")]
fn test_is_supported(name: &str, expected: bool) {
    assert_eq!(is_supported(Path::new(name)), expected);
}

// ============================================================================
// Header Validation Tests
// ============================================================================

#[test]
fn test_headers_case_insensitive() {
    let headers = vec![
        "addressline1".to_string(),
        " Id ".to_string(),
        "AddressLine3".to_string(),
    ];
    let map = ColumnMap::from_headers("f.csv", &headers).unwrap();
    assert_eq!(map.id, 1);
    assert_eq!(map.line_1, 0);
    assert_eq!(map.line_2, None);
    assert_eq!(map.line_3, Some(2));
}

#[test]
fn test_missing_required_column_is_schema_error() {
    let dir = TempDir::new().unwrap();
    let path = write(dir.path(), "bad.csv", "ID,ADDRESSLINE2\n1,foo\n");

    let err = Extractor::new(dir.path()).open(&path).unwrap_err();
    match err {
        Error::Schema { missing, .. } => assert_eq!(missing, vec!["ADDRESSLINE1"]),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_both_required_columns_missing() {
    let headers = vec!["NAME".to_string()];
    let err = ColumnMap::from_headers("f.csv", &headers).unwrap_err();
    assert!(err.to_string().contains("ID, ADDRESSLINE1"));
}

// ============================================================================
// Streaming Tests
// ============================================================================

#[test]
fn test_stream_records_and_rejections() {
    let dir = TempDir::new().unwrap();
    let path = write(
        dir.path(),
        "in.csv",
        "ID,ADDRESSLINE1,ADDRESSLINE2,ADDRESSLINE3\n\
         42,1 Main St,Apt 2,\n\
         ,2 Side St,,\n\
         ,,,\n\
         7, 3 High St ,London,UK\n",
    );

    let mut stream = Extractor::new(dir.path()).open(&path).unwrap();
    let chunk = stream.next_chunk().unwrap().unwrap();
    assert!(stream.next_chunk().unwrap().is_none());

    assert_eq!(chunk.records.len(), 2);
    assert_eq!(
        chunk.rejected,
        vec![RowRejection {
            row_number: 2,
            reason: "empty ID".to_string()
        }]
    );

    let first = &chunk.records[0];
    assert_eq!(first.source_id, "42");
    assert_eq!(first.address_line_1, "1 Main St");
    assert_eq!(first.address_line_2.as_deref(), Some("Apt 2"));
    assert_eq!(first.address_line_3, None);
    assert_eq!(first.row_number, 1);

    let second = &chunk.records[1];
    assert_eq!(second.address_line_1, "3 High St");
    assert_eq!(second.row_number, 4);
    assert!(second.origin_file.ends_with("in.csv"));
}

#[test]
fn test_stream_chunks_respect_size() {
    let dir = TempDir::new().unwrap();
    let mut content = String::from("ID,ADDRESSLINE1\n");
    for i in 0..7 {
        content.push_str(&format!("{i},{i} Main St\n"));
    }
    let path = write(dir.path(), "many.csv", &content);

    let mut stream = Extractor::new(dir.path())
        .with_chunk_size(3)
        .open(&path)
        .unwrap();

    let mut sizes = Vec::new();
    while let Some(chunk) = stream.next_chunk().unwrap() {
        sizes.push(chunk.len());
    }
    assert_eq!(sizes, vec![3, 3, 1]);
}

#[test]
fn test_open_restarts_from_beginning() {
    let dir = TempDir::new().unwrap();
    let path = write(dir.path(), "r.csv", "ID,ADDRESSLINE1\n1,a\n2,b\n");
    let extractor = Extractor::new(dir.path());

    let first: Vec<_> = extractor.open(&path).unwrap().collect();
    let second: Vec<_> = extractor.open(&path).unwrap().collect();
    assert_eq!(first.len(), 2);
    assert_eq!(first.len(), second.len());
}

#[test]
fn test_header_only_file_yields_nothing() {
    let dir = TempDir::new().unwrap();
    let path = write(dir.path(), "empty.csv", "ID,ADDRESSLINE1\n");
    let mut stream = Extractor::new(dir.path()).open(&path).unwrap();
    assert!(stream.next_chunk().unwrap().is_none());
}

// ============================================================================
// Workbook Tests
// ============================================================================

/// Header, a numeric ID, a missing row, a text ID and a blank-text row
fn write_workbook(path: &Path) {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, "Id").unwrap();
    sheet.write_string(0, 1, "AddressLine1").unwrap();
    sheet.write_string(0, 2, "ADDRESSLINE2").unwrap();

    sheet.write_number(1, 0, 42.0).unwrap();
    sheet.write_string(1, 1, "1 Main St").unwrap();
    sheet.write_string(1, 2, "Apt 2").unwrap();

    sheet.write_string(3, 0, "B-7").unwrap();
    sheet.write_string(3, 1, " 5 Elm St ").unwrap();

    sheet.write_string(4, 1, "   ").unwrap();

    sheet.write_number(5, 0, 1.5).unwrap();
    sheet.write_string(5, 1, "9 Oak Ave").unwrap();
    workbook.save(path).unwrap();
}

#[test]
fn test_open_xlsx_workbook() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("book.xlsx");
    write_workbook(&path);

    let stream = Extractor::new(dir.path()).open(&path).unwrap();
    assert_eq!(stream.columns().line_2, Some(2));
    assert_eq!(stream.columns().line_3, None);

    let records: Vec<_> = stream
        .map(|row| match row.unwrap() {
            ExtractedRow::Record(record) => record,
            ExtractedRow::Rejected(r) => panic!("unexpected rejection {r:?}"),
        })
        .collect();

    assert_eq!(records.len(), 3);
    assert_eq!(records[0].source_id, "42");
    assert_eq!(records[0].address_line_1, "1 Main St");
    assert_eq!(records[0].address_line_2.as_deref(), Some("Apt 2"));
    assert_eq!(records[0].row_number, 1);

    assert_eq!(records[1].source_id, "B-7");
    assert_eq!(records[1].address_line_1, "5 Elm St");
    assert_eq!(records[1].address_line_2, None);
    assert_eq!(records[1].row_number, 3);

    assert_eq!(records[2].source_id, "1.5");
    assert_eq!(records[2].row_number, 5);
}

#[test]
fn test_xlsx_missing_column_is_schema_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.xlsx");
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, "ID").unwrap();
    sheet.write_string(0, 1, "STREET").unwrap();
    sheet.write_string(1, 0, "1").unwrap();
    workbook.save(&path).unwrap();

    let err = Extractor::new(dir.path()).open(&path).unwrap_err();
    assert!(matches!(err, Error::Schema { .. }));
}

#[test]
fn test_xlsx_stream_dropped_early() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("big.xlsx");
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, "ID").unwrap();
    sheet.write_string(0, 1, "ADDRESSLINE1").unwrap();
    for i in 1..2000u32 {
        sheet.write_number(i, 0, f64::from(i)).unwrap();
        sheet.write_string(i, 1, "1 Main St").unwrap();
    }
    workbook.save(&path).unwrap();

    let mut stream = Extractor::new(dir.path())
        .with_chunk_size(10)
        .open(&path)
        .unwrap();
    let chunk = stream.next_chunk().unwrap().unwrap();
    assert_eq!(chunk.records.len(), 10);
    assert_eq!(chunk.records[9].source_id, "10");
    drop(stream);
}

#[test]
fn test_unreadable_xlsx_is_spreadsheet_error() {
    let dir = TempDir::new().unwrap();
    let path = write(dir.path(), "broken.xlsx", "not a zip");
    let err = Extractor::new(dir.path()).open(&path).unwrap_err();
    assert!(matches!(err, Error::Spreadsheet { .. }));
}

// ============================================================================
// Cell Rendering Tests
// ============================================================================

#[test]
fn test_cell_to_string() {
    assert_eq!(cell_to_string(&Data::Empty), "");
    assert_eq!(cell_to_string(&Data::Float(42.0)), "42");
    assert_eq!(cell_to_string(&Data::Float(1.5)), "1.5");
    assert_eq!(cell_to_string(&Data::Int(7)), "7");
    assert_eq!(cell_to_string(&Data::String(" Apt 2 ".into())), "Apt 2");
    assert_eq!(cell_to_string(&Data::Bool(true)), "true");
}
