//! Tests for output module

use super::*;
use crate::record::{Component, Components, EnrichedAddressRecord, ParsedAddressRecord, RawAddressRecord};
use crate::repository::COLUMNS;
use crate::types::OutputFormat;
use arrow::array::{Array, StringArray, TimestampMicrosecondArray};
use arrow::datatypes::DataType;
use calamine::{open_workbook, Data, Reader, Xlsx};
use chrono::{DateTime, TimeZone, Utc};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use pretty_assertions::assert_eq;
use std::fs::File;
use std::path::Path;
use tempfile::tempdir;
use test_case::test_case;

fn ts() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()
}

fn records() -> Vec<EnrichedAddressRecord> {
    let mut components = Components::new();
    components.insert(Component::StreetNumber, "10".to_string());
    components.insert(Component::StreetName, "Main St".to_string());
    let ok = ParsedAddressRecord::ok(
        RawAddressRecord::new("1", "10 Main St", "in.csv").with_line_2("Springfield, IL"),
        components,
    );
    let failed = ParsedAddressRecord::failed(RawAddressRecord::new("2", "???", "in.csv"), "no address tokens");

    [ok, failed]
        .into_iter()
        .map(|p| EnrichedAddressRecord::new(p, "in.csv".to_string(), ts(), "HOST".to_string()))
        .collect()
}

// ============================================================================
// Naming
// ============================================================================

#[test_case("in/addresses.xlsx", OutputFormat::Csv, "addresses_20240102T030405Z.csv")]
#[test_case("batch.csv", OutputFormat::Parquet, "batch_20240102T030405Z.parquet")]
#[test_case("noext", OutputFormat::Csv, "noext_20240102T030405Z.csv")]
#[test_case("batch.csv", OutputFormat::Xlsx, "batch_20240102T030405Z.xlsx")]
fn test_output_file_name(source: &str, format: OutputFormat, expected: &str) {
    assert_eq!(output_file_name(Path::new(source), format, ts()), expected);
}

// ============================================================================
// Schema
// ============================================================================

#[test]
fn test_output_schema_matches_table() {
    let schema = output_schema();
    assert_eq!(schema.fields().len(), COLUMNS.len());
    assert_eq!(schema.field(0).name(), "source_id");
    assert!(!schema.field(0).is_nullable());
    assert_eq!(
        schema.field_with_name("processed_timestamp").unwrap().data_type(),
        &DataType::Timestamp(arrow::datatypes::TimeUnit::Microsecond, Some("UTC".into()))
    );
    assert_eq!(
        schema.field_with_name("unit").unwrap().data_type(),
        &DataType::Utf8
    );
}

#[test]
fn test_records_to_batch() {
    let batch = records_to_batch(&records()).unwrap();
    assert_eq!(batch.num_rows(), 2);
    assert_eq!(batch.num_columns(), COLUMNS.len());

    let street = batch
        .column_by_name("street_name")
        .unwrap()
        .as_any()
        .downcast_ref::<StringArray>()
        .unwrap();
    assert_eq!(street.value(0), "Main St");
    assert!(street.is_null(1));

    let stamps = batch
        .column_by_name("processed_timestamp")
        .unwrap()
        .as_any()
        .downcast_ref::<TimestampMicrosecondArray>()
        .unwrap();
    assert_eq!(stamps.value(0), ts().timestamp_micros());
}

#[test]
fn test_records_to_batch_empty() {
    let batch = records_to_batch(&[]).unwrap();
    assert_eq!(batch.num_rows(), 0);
}

// ============================================================================
// Writers
// ============================================================================

#[test]
fn test_csv_artifact() {
    let dir = tempdir().unwrap();
    let mut writer =
        OutputWriter::create(dir.path(), Path::new("in.csv"), OutputFormat::Csv, ts()).unwrap();
    let records = records();
    writer.write(&records[..1]).unwrap();
    writer.write(&records[1..]).unwrap();
    assert_eq!(writer.rows_written(), 2);
    let path = writer.finish().unwrap();

    assert_eq!(path.file_name().unwrap(), "in_20240102T030405Z.csv");

    let mut reader = csv::Reader::from_path(&path).unwrap();
    let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
    assert_eq!(headers.len(), COLUMNS.len());
    assert_eq!(headers[0], "source_id");

    let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(&rows[0][0], "1");
    assert_eq!(&rows[0][2], "Springfield, IL");
    assert_eq!(&rows[1][14], "FAILED");
    assert_eq!(&rows[1][15], "no address tokens");
}

#[test]
fn test_parquet_artifact() {
    let dir = tempdir().unwrap();
    let mut writer =
        OutputWriter::create(dir.path(), Path::new("in.xlsx"), OutputFormat::Parquet, ts())
            .unwrap();
    writer.write(&records()).unwrap();
    let path = writer.finish().unwrap();
    assert_eq!(path.extension().unwrap(), "parquet");

    let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(&path).unwrap())
        .unwrap()
        .build()
        .unwrap();
    let rows: usize = reader.map(|b| b.unwrap().num_rows()).sum();
    assert_eq!(rows, 2);
}

#[test]
fn test_xlsx_artifact() {
    let dir = tempdir().unwrap();
    let mut writer =
        OutputWriter::create(dir.path(), Path::new("in.csv"), OutputFormat::Xlsx, ts()).unwrap();
    writer.write(&records()[..1]).unwrap();
    writer.write(&records()[1..]).unwrap();
    let path = writer.finish().unwrap();
    assert_eq!(path.file_name().unwrap(), "in_20240102T030405Z.xlsx");

    let mut workbook: Xlsx<_> = open_workbook(&path).unwrap();
    let sheet = workbook.worksheet_range_at(0).unwrap().unwrap();
    assert_eq!(sheet.height(), 3);
    assert_eq!(sheet.width(), COLUMNS.len());

    let text = |row: usize, col: usize| sheet.get((row, col)).cloned().unwrap_or(Data::Empty);
    assert_eq!(text(0, 0), Data::String("source_id".into()));
    assert_eq!(text(1, 0), Data::String("1".into()));
    assert_eq!(text(1, 2), Data::String("Springfield, IL".into()));
    assert_eq!(text(2, 14), Data::String("FAILED".into()));
    assert_eq!(text(2, 15), Data::String("no address tokens".into()));
}

#[test]
fn test_xlsx_discard_removes_artifact() {
    let dir = tempdir().unwrap();
    let mut writer =
        OutputWriter::create(dir.path(), Path::new("in.csv"), OutputFormat::Xlsx, ts()).unwrap();
    writer.write(&records()).unwrap();
    let path = writer.path().to_path_buf();

    writer.discard();
    assert!(!path.exists());
}

#[test]
fn test_artifact_names_never_collide() {
    let dir = tempdir().unwrap();
    let first =
        OutputWriter::create(dir.path(), Path::new("a.csv"), OutputFormat::Csv, ts()).unwrap();
    let second =
        OutputWriter::create(dir.path(), Path::new("a.xlsx"), OutputFormat::Csv, ts()).unwrap();

    assert_eq!(first.path().file_name().unwrap(), "a_20240102T030405Z.csv");
    assert_eq!(second.path().file_name().unwrap(), "a_20240102T030405Z_1.csv");
}

#[test]
fn test_discard_removes_artifact() {
    let dir = tempdir().unwrap();
    let mut writer =
        OutputWriter::create(dir.path(), Path::new("in.csv"), OutputFormat::Parquet, ts())
            .unwrap();
    writer.write(&records()).unwrap();
    let path = writer.path().to_path_buf();
    assert!(path.exists());

    writer.discard();
    assert!(!path.exists());
}

#[test]
fn test_remove_output_missing_is_quiet() {
    let dir = tempdir().unwrap();
    remove_output(&dir.path().join("never-written.csv"));
}

#[test]
fn test_parquet_writer_close_reports_rows() {
    let dir = tempdir().unwrap();
    let file = File::create(dir.path().join("w.parquet")).unwrap();
    let mut writer =
        ParquetWriter::new(file, output_schema().as_ref(), &ParquetWriterConfig::default()).unwrap();
    writer.write(&records_to_batch(&records()).unwrap()).unwrap();
    writer.write(&records_to_batch(&records()[..1]).unwrap()).unwrap();
    assert_eq!(writer.close().unwrap(), 3);
}
