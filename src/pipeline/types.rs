//! Pipeline types
//!
//! Per-file outcomes, the run summary accumulator, settings and the
//! cancellation flag.

use crate::extract::RowRejection;
use crate::repository::RowFailure;
use crate::types::{FileStage, OutputFormat};
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// ============================================================================
// Settings
// ============================================================================

/// Orchestrator settings
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Directory for output artifacts
    pub output_dir: PathBuf,
    pub output_format: OutputFormat,
    /// Files processed at once (1 = sequential)
    pub max_concurrent_files: usize,
    /// Upper-cased operator/host label stamped on every record
    pub extracted_by: String,
}

impl PipelineSettings {
    pub fn new(output_dir: impl Into<PathBuf>, extracted_by: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            output_format: OutputFormat::default(),
            max_concurrent_files: 1,
            extracted_by: extracted_by.into(),
        }
    }

    #[must_use]
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    #[must_use]
    pub fn with_max_concurrent_files(mut self, n: usize) -> Self {
        self.max_concurrent_files = n.max(1);
        self
    }
}

// ============================================================================
// Cancellation
// ============================================================================

/// Shared flag checked before each file starts
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ============================================================================
// File State
// ============================================================================

/// Where a file ended up in `DISCOVERED -> ... -> ARCHIVED`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    /// Last stage the file completed
    Reached(FileStage),
    /// The stage that failed
    Failed(FileStage),
}

impl FileState {
    pub fn is_failed(self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Whether the file's rows were committed
    pub fn is_persisted(self) -> bool {
        matches!(self, Self::Reached(stage) if stage >= FileStage::Persisted)
    }
}

impl fmt::Display for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reached(stage) => write!(f, "{stage}"),
            Self::Failed(stage) => write!(f, "FAILED({stage})"),
        }
    }
}

impl Serialize for FileState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ============================================================================
// File Outcome
// ============================================================================

/// Row counts for one file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RowCounts {
    /// Data rows read, rejected ones included
    pub total: usize,
    pub parsed_ok: usize,
    pub parsed_failed: usize,
    /// Rows dropped by the extractor or by store validation
    pub rejected: usize,
    pub inserted: usize,
    pub updated: usize,
}

impl RowCounts {
    /// Rows written by the commit
    pub fn persisted(&self) -> usize {
        self.inserted + self.updated
    }
}

/// Result of processing one input file
#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    pub file: PathBuf,
    pub state: FileState,
    pub rows: RowCounts,
    /// Rows persisted as FAILED, and rows the store refused
    pub failed_rows: Vec<RowFailure>,
    /// Rows the extractor could not turn into records
    pub rejected_rows: Vec<RowRejection>,
    pub output: Option<PathBuf>,
    pub archived_input: Option<PathBuf>,
    pub archived_output: Option<PathBuf>,
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

impl FileOutcome {
    pub fn new(file: &Path) -> Self {
        Self {
            file: file.to_path_buf(),
            state: FileState::Reached(FileStage::Discovered),
            rows: RowCounts::default(),
            failed_rows: Vec::new(),
            rejected_rows: Vec::new(),
            output: None,
            archived_input: None,
            archived_output: None,
            errors: Vec::new(),
            duration_ms: 0,
        }
    }

    /// File name without directories
    pub fn file_name(&self) -> String {
        self.file
            .file_name()
            .map_or_else(|| self.file.display().to_string(), |n| n.to_string_lossy().into_owned())
    }

    pub fn is_failed(&self) -> bool {
        self.state.is_failed()
    }
}

// ============================================================================
// Run Summary
// ============================================================================

/// Accumulated result of one run, files in discovery order
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub files: Vec<FileOutcome>,
    /// Files never started because the run was cancelled
    pub skipped: Vec<PathBuf>,
    pub cancelled: bool,
    pub files_processed: usize,
    pub files_failed: usize,
    pub rows_total: usize,
    pub rows_persisted: usize,
    pub rows_failed_parse: usize,
    pub rows_rejected: usize,
    pub inserted: usize,
    pub updated: usize,
}

impl RunSummary {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            finished_at: started_at,
            files: Vec::new(),
            skipped: Vec::new(),
            cancelled: false,
            files_processed: 0,
            files_failed: 0,
            rows_total: 0,
            rows_persisted: 0,
            rows_failed_parse: 0,
            rows_rejected: 0,
            inserted: 0,
            updated: 0,
        }
    }

    /// Fold a file outcome into the totals
    pub fn record(&mut self, outcome: FileOutcome) {
        if outcome.is_failed() {
            self.files_failed += 1;
        } else {
            self.files_processed += 1;
        }
        if outcome.state.is_persisted() {
            self.rows_persisted += outcome.rows.persisted();
            self.rows_failed_parse += outcome.rows.parsed_failed;
            self.inserted += outcome.rows.inserted;
            self.updated += outcome.rows.updated;
        }
        self.rows_total += outcome.rows.total;
        self.rows_rejected += outcome.rows.rejected;
        self.files.push(outcome);
    }

    /// Note a file that was never started
    pub fn skip(&mut self, file: PathBuf) {
        self.cancelled = true;
        self.skipped.push(file);
    }

    /// No file failed and nothing was skipped
    pub fn is_success(&self) -> bool {
        self.files_failed == 0 && !self.cancelled
    }

    pub fn outcome(&self, file_name: &str) -> Option<&FileOutcome> {
        self.files.iter().find(|f| f.file_name() == file_name)
    }
}
