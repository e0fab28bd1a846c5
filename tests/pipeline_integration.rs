//! End-to-end pipeline tests
//!
//! Each test builds a pipeline from a YAML config in a temp directory,
//! runs it against a file-backed DuckDB store and inspects the store, the
//! archive directories and the run summary.

use addr_pipeline::config::PipelineConfig;
use addr_pipeline::pipeline::{CancellationFlag, FileState};
use addr_pipeline::FileStage;
use pretty_assertions::assert_eq;
use rust_xlsxwriter::Workbook;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

// ============================================================================
// Fixtures
// ============================================================================

const HEADER: &str = "ID,ADDRESSLINE1,ADDRESSLINE2,ADDRESSLINE3\n";

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new(extra_yaml: &str) -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("in")).unwrap();

        let yaml = format!(
            "input_dir: in\n\
             output_dir: out\n\
             archive:\n  raw_dir: archive/raw\n  processed_dir: archive/processed\n\
             database:\n  url: store.duckdb\n\
             extracted_by: integration\n\
             batch_size: 3\n\
             {extra_yaml}"
        );
        fs::write(dir.path().join("pipeline.yaml"), yaml).unwrap();
        Self { dir }
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn config(&self) -> PipelineConfig {
        PipelineConfig::load(self.root().join("pipeline.yaml")).unwrap()
    }

    fn input(&self, name: &str, rows: &[&str]) -> PathBuf {
        let mut body = HEADER.to_string();
        for row in rows {
            body.push_str(row);
            body.push('\n');
        }
        let path = self.root().join("in").join(name);
        fs::write(&path, body).unwrap();
        path
    }

    fn entries(&self, dir: &str) -> Vec<String> {
        let Ok(read) = fs::read_dir(self.root().join(dir)) else {
            return Vec::new();
        };
        let mut names: Vec<String> = read
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

fn numbered_rows(prefix: &str, n: usize) -> Vec<String> {
    (1..=n)
        .map(|i| format!("{prefix}{i},{i} Main St,Apt {i},Springfield IL 62704"))
        .collect()
}

// ============================================================================
// Heuristic parser + DuckDB file
// ============================================================================

#[tokio::test]
async fn test_end_to_end_two_files() {
    let ws = Workspace::new("");

    let mut a = numbered_rows("A", 10);
    a[3] = "A4,---,,".to_string();
    let mut b = numbered_rows("B", 10);
    b[7] = "B8,---,,".to_string();
    ws.input("a.csv", &a.iter().map(String::as_str).collect::<Vec<_>>());
    ws.input("b.csv", &b.iter().map(String::as_str).collect::<Vec<_>>());

    let config = ws.config();
    let pipeline = config.build_pipeline().unwrap();
    let summary = pipeline.run(&CancellationFlag::new()).await.unwrap();

    assert!(summary.is_success());
    assert_eq!(summary.files_processed, 2);
    assert_eq!(summary.files_failed, 0);
    assert_eq!(summary.rows_total, 20);
    assert_eq!(summary.rows_persisted, 20);
    assert_eq!(summary.rows_failed_parse, 2);
    assert_eq!(summary.inserted, 20);
    assert_eq!(summary.updated, 0);

    for outcome in &summary.files {
        assert_eq!(outcome.state, FileState::Reached(FileStage::Archived));
    }

    let repository = pipeline.repository();
    assert_eq!(repository.count().await.unwrap(), 20);

    let row = repository.fetch("A1").await.unwrap().unwrap();
    assert_eq!(row["street_number"].as_deref(), Some("1"));
    assert_eq!(row["street_name"].as_deref(), Some("Main St"));
    assert_eq!(row["unit"].as_deref(), Some("1"));
    assert_eq!(row["parse_status"].as_deref(), Some("OK"));
    assert_eq!(row["filename"].as_deref(), Some("a.csv"));
    assert_eq!(row["extracted_by"].as_deref(), Some("INTEGRATION"));
    assert_eq!(row["completeness"].as_deref(), Some("PERFECT"));

    let failed = repository.fetch("B8").await.unwrap().unwrap();
    assert_eq!(failed["parse_status"].as_deref(), Some("FAILED"));
    assert!(failed["parse_error"].is_some());
    assert_eq!(failed["street_number"], None);

    assert!(ws.entries("in").is_empty());
    let raw = ws.entries("archive/raw");
    assert_eq!(raw.len(), 2);
    assert!(raw[0].starts_with("a_") && raw[0].ends_with(".csv"));
    assert!(raw[1].starts_with("b_") && raw[1].ends_with(".csv"));
    assert_eq!(ws.entries("archive/processed").len(), 2);
    assert!(ws.entries("out").is_empty());
}

#[tokio::test]
async fn test_rerun_updates_in_place() {
    let ws = Workspace::new("");
    ws.input("a.csv", &["42,1 Main St,Apt 2,", "43,5 Elm St,,"]);

    {
        let pipeline = ws.config().build_pipeline().unwrap();
        let summary = pipeline.run(&CancellationFlag::new()).await.unwrap();
        assert_eq!(summary.inserted, 2);
    }

    ws.input("a.csv", &["42,9 Oak Ave,,"]);
    let pipeline = ws.config().build_pipeline().unwrap();
    let summary = pipeline.run(&CancellationFlag::new()).await.unwrap();

    assert!(summary.is_success());
    assert_eq!(summary.inserted, 0);
    assert_eq!(summary.updated, 1);

    let repository = pipeline.repository();
    assert_eq!(repository.count().await.unwrap(), 2);
    let row = repository.fetch("42").await.unwrap().unwrap();
    assert_eq!(row["address_line_1"].as_deref(), Some("9 Oak Ave"));
    assert_eq!(row["street_name"].as_deref(), Some("Oak Ave"));
    assert_eq!(row["unit"], None);

    assert_eq!(ws.entries("archive/raw").len(), 2);
}

#[tokio::test]
async fn test_schema_failure_leaves_file_in_place() {
    let ws = Workspace::new("");
    ws.input("good.csv", &["1,1 Main St,,"]);
    fs::write(ws.root().join("in/bad.csv"), "ID,STREET\n1,1 Main St\n").unwrap();

    let pipeline = ws.config().build_pipeline().unwrap();
    let summary = pipeline.run(&CancellationFlag::new()).await.unwrap();

    assert!(!summary.is_success());
    assert_eq!(summary.files_failed, 1);

    let bad = summary.outcome("bad.csv").unwrap();
    assert_eq!(bad.state, FileState::Failed(FileStage::Extracted));
    assert!(bad.errors[0].contains("ADDRESSLINE1"));
    assert_eq!(bad.archived_input, None);

    let good = summary.outcome("good.csv").unwrap();
    assert_eq!(good.state, FileState::Reached(FileStage::Archived));

    assert_eq!(ws.entries("in"), vec!["bad.csv".to_string()]);
    assert_eq!(pipeline.repository().count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_parquet_artifact() {
    let ws = Workspace::new("output:\n  format: parquet\n");
    ws.input("a.csv", &["1,1 Main St,,", "2,2 Main St,,"]);

    let pipeline = ws.config().build_pipeline().unwrap();
    let summary = pipeline.run(&CancellationFlag::new()).await.unwrap();
    assert!(summary.is_success());

    let processed = ws.entries("archive/processed");
    assert_eq!(processed.len(), 1);
    assert!(processed[0].starts_with("a_"));
    assert!(processed[0].ends_with(".parquet"));
}

#[tokio::test]
async fn test_xlsx_artifact() {
    let ws = Workspace::new("output:\n  format: xlsx\n");
    ws.input("a.csv", &["1,1 Main St,,"]);

    let pipeline = ws.config().build_pipeline().unwrap();
    let summary = pipeline.run(&CancellationFlag::new()).await.unwrap();
    assert!(summary.is_success());

    let archived = summary.files[0].archived_output.clone().unwrap();
    assert_eq!(
        archived.file_name(),
        summary.files[0].output.as_ref().unwrap().file_name()
    );
    let processed = ws.entries("archive/processed");
    assert_eq!(processed.len(), 1);
    assert!(processed[0].starts_with("a_") && processed[0].ends_with("Z.xlsx"));
}

#[tokio::test]
async fn test_xlsx_input() {
    let ws = Workspace::new("");
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (col, name) in ["ID", "ADDRESSLINE1", "ADDRESSLINE2"].into_iter().enumerate() {
        sheet.write_string(0, col as u16, name).unwrap();
    }
    sheet.write_number(1, 0, 1001.0).unwrap();
    sheet.write_string(1, 1, "1 Main St").unwrap();
    sheet.write_string(1, 2, "Apt 4").unwrap();
    sheet.write_number(3, 0, 1002.0).unwrap();
    sheet.write_string(3, 1, "2 Elm St").unwrap();
    workbook.save(ws.root().join("in/book.xlsx")).unwrap();

    let pipeline = ws.config().build_pipeline().unwrap();
    let summary = pipeline.run(&CancellationFlag::new()).await.unwrap();

    assert!(summary.is_success());
    assert_eq!(summary.rows_total, 2);
    assert_eq!(summary.inserted, 2);

    let row = pipeline.repository().fetch("1001").await.unwrap().unwrap();
    assert_eq!(row["street_name"].as_deref(), Some("Main St"));
    assert_eq!(row["unit"].as_deref(), Some("4"));
    assert_eq!(row["filename"].as_deref(), Some("book.xlsx"));

    let raw = ws.entries("archive/raw");
    assert!(raw[0].starts_with("book_") && raw[0].ends_with(".xlsx"));
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let ws = Workspace::new("");
    ws.input("a.csv", &["1,1 Main St,,"]);

    let cancel = CancellationFlag::new();
    cancel.cancel();

    let pipeline = ws.config().build_pipeline().unwrap();
    let summary = pipeline.run(&cancel).await.unwrap();

    assert!(summary.cancelled);
    assert!(!summary.is_success());
    assert_eq!(summary.skipped.len(), 1);
    assert_eq!(ws.entries("in"), vec!["a.csv".to_string()]);
}

// ============================================================================
// HTTP parser
// ============================================================================

/// Answers `{"addresses": [...]}` with one result per address; addresses
/// containing `BAD` get an error entry
struct EchoParser;

impl Respond for EchoParser {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).unwrap();
        let results: Vec<Value> = body["addresses"]
            .as_array()
            .unwrap()
            .iter()
            .map(|a| {
                let text = a.as_str().unwrap();
                if text.contains("BAD") {
                    return json!({"error": "unparseable"});
                }
                let (number, road) = text.split_once(' ').unwrap_or(("", text));
                let road = road.split(',').next().unwrap_or_default();
                json!({"components": {"house_number": number, "road": road}})
            })
            .collect();
        ResponseTemplate::new(200).set_body_json(json!({ "results": results }))
    }
}

#[tokio::test]
async fn test_http_parser_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/parse"))
        .respond_with(EchoParser)
        .mount(&server)
        .await;

    let ws = Workspace::new(&format!(
        "parser:\n  kind: http\n  endpoint: {}/parse\n  max_retries: 0\n",
        server.uri()
    ));
    ws.input("a.csv", &["1,10 High St,,", "2,BAD,,", "3,12 Low Rd,,"]);

    let pipeline = ws.config().build_pipeline().unwrap();
    let summary = pipeline.run(&CancellationFlag::new()).await.unwrap();

    assert!(summary.is_success());
    assert_eq!(summary.rows_persisted, 3);
    assert_eq!(summary.rows_failed_parse, 1);

    let repository = pipeline.repository();
    let row = repository.fetch("3").await.unwrap().unwrap();
    assert_eq!(row["street_number"].as_deref(), Some("12"));
    assert_eq!(row["street_name"].as_deref(), Some("Low Rd"));

    let failed = repository.fetch("2").await.unwrap().unwrap();
    assert_eq!(failed["parse_status"].as_deref(), Some("FAILED"));
    assert_eq!(failed["parse_error"].as_deref(), Some("unparseable"));
}

#[tokio::test]
async fn test_http_parser_outage_fails_file() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let ws = Workspace::new(&format!(
        "parser:\n  kind: http\n  endpoint: {}/parse\n  max_retries: 0\n",
        server.uri()
    ));
    ws.input("a.csv", &["1,10 High St,,"]);

    let pipeline = ws.config().build_pipeline().unwrap();
    let summary = pipeline.run(&CancellationFlag::new()).await.unwrap();

    assert!(!summary.is_success());
    let outcome = summary.outcome("a.csv").unwrap();
    assert_eq!(outcome.state, FileState::Failed(FileStage::Parsed));
    assert_eq!(pipeline.repository().count().await.unwrap(), 0);
    assert_eq!(ws.entries("in"), vec!["a.csv".to_string()]);
    assert!(ws.entries("out").is_empty());
}

#[tokio::test]
async fn test_http_parser_unauthorized_fails_file() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad token"))
        .expect(1)
        .mount(&server)
        .await;

    let ws = Workspace::new(&format!(
        "parser:\n  kind: http\n  endpoint: {}/parse\n  max_retries: 0\n",
        server.uri()
    ));
    ws.input("a.csv", &["1,10 High St,,", "2,12 Low Rd,,"]);

    let pipeline = ws.config().build_pipeline().unwrap();
    let summary = pipeline.run(&CancellationFlag::new()).await.unwrap();

    assert!(!summary.is_success());
    let outcome = summary.outcome("a.csv").unwrap();
    assert_eq!(outcome.state, FileState::Failed(FileStage::Parsed));
    assert!(outcome.errors[0].contains("401"));
    assert!(outcome.failed_rows.is_empty());
    assert_eq!(pipeline.repository().count().await.unwrap(), 0);
    assert_eq!(ws.entries("in"), vec!["a.csv".to_string()]);
    assert!(ws.entries("archive/raw").is_empty());
}
