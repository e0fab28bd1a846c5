//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands, ReportFormat};
use crate::config::{ConfigOverrides, PipelineConfig};
use crate::error::Result;
use crate::extract::Extractor;
use crate::pipeline::{CancellationFlag, FileOutcome, RunSummary};
use crate::repository::AddressRepository;
use serde_json::{json, Value};
use std::fmt::Write as _;
use tracing::{info, warn};

/// CLI runner
pub struct Runner {
    cli: Cli,
    cancel: CancellationFlag,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self {
            cli,
            cancel: CancellationFlag::new(),
        }
    }

    /// Flag that stops the run after the files already in flight
    pub fn cancellation(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    /// Run the CLI command. `Ok(false)` means the process should exit 1.
    pub async fn run(&self) -> Result<bool> {
        match self.cli.command.unwrap_or(Commands::Run) {
            Commands::Run => self.run_pipeline().await,
            Commands::Check => self.check().await,
            Commands::Discover => self.discover(),
            Commands::Validate => self.validate(),
        }
    }

    // ========================================================================
    // Commands
    // ========================================================================

    async fn run_pipeline(&self) -> Result<bool> {
        let config = self.load_config()?;
        let pipeline = config.build_pipeline()?;

        info!(
            config = %self.cli.config.display(),
            parser = pipeline.parser().parser().name(),
            format = ?config.output.format,
            "Pipeline ready"
        );

        let summary = pipeline.run(&self.cancel).await?;
        self.report_summary(&summary);

        if summary.cancelled {
            warn!(skipped = summary.skipped.len(), "Run cancelled");
        }
        Ok(summary.is_success())
    }

    async fn check(&self) -> Result<bool> {
        let config = self.load_config()?;
        let repository = config.open_repository()?;
        let parser = config.build_parser()?;

        let store = repository.describe();
        let store_result = match repository.check().await {
            Ok(()) => repository.ensure_schema().await,
            Err(e) => Err(e),
        };
        let parser_result = parser.ping().await;

        let ok = store_result.is_ok() && parser_result.is_ok();
        self.output_message(&json!({
            "status": if ok { "SUCCEEDED" } else { "FAILED" },
            "store": {
                "target": store,
                "table": repository.table(),
                "ok": store_result.is_ok(),
                "error": store_result.err().map(|e| e.to_string()),
            },
            "parser": {
                "name": parser.name(),
                "ok": parser_result.is_ok(),
                "error": parser_result.err().map(|e| e.to_string()),
            },
        }));

        Ok(ok)
    }

    fn discover(&self) -> Result<bool> {
        let config = self.load_config()?;
        let files = Extractor::new(&config.input_dir).discover()?;

        let names: Vec<String> = files.iter().map(|p| p.display().to_string()).collect();
        self.output_message(&json!({
            "input_dir": config.input_dir.display().to_string(),
            "count": names.len(),
            "files": names,
        }));

        Ok(true)
    }

    fn validate(&self) -> Result<bool> {
        let config = self.load_config()?;

        self.output_message(&json!({
            "status": "VALID",
            "config": self.cli.config.display().to_string(),
            "input_dir": config.input_dir.display().to_string(),
            "output_dir": config.output_dir.display().to_string(),
            "parser": config.parser.kind,
            "output_format": config.output.format,
            "batch_size": config.batch_size,
        }));

        Ok(true)
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Read the config file, apply CLI overrides, then validate
    fn load_config(&self) -> Result<PipelineConfig> {
        let mut config = PipelineConfig::read(&self.cli.config)?;
        config.apply(ConfigOverrides::from(self.cli.overrides.clone()));
        config.validate()?;
        Ok(config)
    }

    /// Output a JSON message
    fn output_message(&self, msg: &Value) {
        match self.cli.format {
            ReportFormat::Json => {
                println!("{}", serde_json::to_string(msg).unwrap_or_default());
            }
            ReportFormat::Pretty => {
                println!("{}", serde_json::to_string_pretty(msg).unwrap_or_default());
            }
        }
    }

    fn report_summary(&self, summary: &RunSummary) {
        match self.cli.format {
            ReportFormat::Json => {
                println!("{}", serde_json::to_string(summary).unwrap_or_default());
            }
            ReportFormat::Pretty => print!("{}", render_summary(summary)),
        }
    }
}

/// Human-readable run summary
pub fn render_summary(summary: &RunSummary) -> String {
    let mut out = String::new();
    let elapsed = summary.finished_at - summary.started_at;

    let _ = writeln!(
        out,
        "Run {} in {}ms{}",
        if summary.is_success() { "succeeded" } else { "failed" },
        elapsed.num_milliseconds(),
        if summary.cancelled { " (cancelled)" } else { "" }
    );
    let _ = writeln!(
        out,
        "Files: {} processed, {} failed, {} skipped",
        summary.files_processed,
        summary.files_failed,
        summary.skipped.len()
    );
    let _ = writeln!(
        out,
        "Rows: {} total, {} persisted ({} inserted, {} updated), {} parse failures, {} rejected",
        summary.rows_total,
        summary.rows_persisted,
        summary.inserted,
        summary.updated,
        summary.rows_failed_parse,
        summary.rows_rejected
    );

    for outcome in &summary.files {
        render_outcome(&mut out, outcome);
    }
    for file in &summary.skipped {
        let _ = writeln!(out, "  {}  SKIPPED", file.display());
    }
    out
}

fn render_outcome(out: &mut String, outcome: &FileOutcome) {
    let _ = writeln!(
        out,
        "  {}  {}  rows={} ok={} failed={} rejected={} inserted={} updated={}",
        outcome.file_name(),
        outcome.state,
        outcome.rows.total,
        outcome.rows.parsed_ok,
        outcome.rows.parsed_failed,
        outcome.rows.rejected,
        outcome.rows.inserted,
        outcome.rows.updated
    );
    // The artifact path only matters while it has not been archived
    match (&outcome.archived_output, &outcome.output) {
        (Some(archived), _) => {
            let _ = writeln!(out, "    output archived: {}", archived.display());
        }
        (None, Some(output)) => {
            let _ = writeln!(out, "    output: {}", output.display());
        }
        (None, None) => {}
    }
    if let Some(archived) = &outcome.archived_input {
        let _ = writeln!(out, "    input archived: {}", archived.display());
    }
    for failure in &outcome.failed_rows {
        let _ = writeln!(out, "    failed row {}: {}", failure.source_id, failure.error);
    }
    for rejection in &outcome.rejected_rows {
        let _ = writeln!(
            out,
            "    rejected row {}: {}",
            rejection.row_number, rejection.reason
        );
    }
    for error in &outcome.errors {
        let _ = writeln!(out, "    error: {error}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::RowRejection;
    use crate::pipeline::FileState;
    use crate::repository::RowFailure;
    use crate::types::FileStage;
    use chrono::{TimeZone, Utc};
    use std::path::{Path, PathBuf};

    fn summary() -> RunSummary {
        let start = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let mut summary = RunSummary::new(start);

        let mut ok = FileOutcome::new(Path::new("/in/a.csv"));
        ok.state = FileState::Reached(FileStage::Archived);
        ok.rows.total = 10;
        ok.rows.parsed_ok = 9;
        ok.rows.parsed_failed = 1;
        ok.rows.inserted = 7;
        ok.rows.updated = 3;
        ok.failed_rows.push(RowFailure::new("B-17", "cannot parse"));
        ok.rejected_rows.push(RowRejection {
            row_number: 4,
            reason: "empty ID".into(),
        });
        ok.output = Some(PathBuf::from("/out/a_20240102T030405Z.csv"));
        ok.archived_input = Some(PathBuf::from("/raw/a_20240102T030405.csv"));
        ok.archived_output = Some(PathBuf::from("/processed/a_20240102T030405Z.csv"));
        summary.record(ok);

        let mut bad = FileOutcome::new(Path::new("/in/b.csv"));
        bad.state = FileState::Failed(FileStage::Extracted);
        bad.errors.push("missing column ADDRESSLINE1".into());
        summary.record(bad);

        summary.finished_at = start + chrono::Duration::milliseconds(1500);
        summary
    }

    #[test]
    fn test_render_summary() {
        let text = render_summary(&summary());

        assert!(text.starts_with("Run failed in 1500ms\n"));
        assert!(text.contains("Files: 1 processed, 1 failed, 0 skipped"));
        assert!(text.contains(
            "a.csv  ARCHIVED  rows=10 ok=9 failed=1 rejected=0 inserted=7 updated=3"
        ));
        assert!(text.contains("input archived: /raw/a_20240102T030405.csv"));
        assert!(text.contains("output archived: /processed/a_20240102T030405Z.csv"));
        assert!(!text.contains("output: /out/"));
        assert!(text.contains("failed row B-17: cannot parse"));
        assert!(text.contains("rejected row 4: empty ID"));
        assert!(text.contains("b.csv  FAILED(EXTRACTED)"));
        assert!(text.contains("error: missing column ADDRESSLINE1"));
    }

    #[test]
    fn test_render_unarchived_output() {
        let mut summary = summary();
        summary.files[0].state = FileState::Reached(FileStage::Persisted);
        summary.files[0].archived_output = None;

        let text = render_summary(&summary);
        assert!(text.contains("a.csv  PERSISTED"));
        assert!(text.contains("output: /out/a_20240102T030405Z.csv"));
    }

    #[test]
    fn test_render_cancelled() {
        let mut summary = summary();
        summary.cancelled = true;
        summary.skip(PathBuf::from("/in/c.csv"));

        let text = render_summary(&summary);
        assert!(text.contains("(cancelled)"));
        assert!(text.contains("/in/c.csv  SKIPPED"));
    }
}
