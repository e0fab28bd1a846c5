//! Per-file state machine and run loop

use super::types::{CancellationFlag, FileOutcome, FileState, PipelineSettings, RunSummary};
use crate::archive::Archiver;
use crate::enrich::{Clock, Enricher, SystemClock};
use crate::error::{Error, Result};
use crate::extract::{Extractor, RecordStream};
use crate::output::{remove_output, OutputWriter};
use crate::parse::ParserAdapter;
use crate::repository::{AddressRepository, RowFailure, UpsertBatch};
use crate::types::FileStage;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, info_span, warn, Instrument};

/// A failure and the stage it happened in
type StageError = (FileStage, Error);

fn at(stage: FileStage) -> impl Fn(Error) -> StageError {
    move |e| (stage, e)
}

/// Runs every discovered input file through
/// extract -> parse -> enrich -> persist -> archive
pub struct Pipeline {
    extractor: Extractor,
    parser: ParserAdapter,
    repository: Arc<dyn AddressRepository>,
    archiver: Archiver,
    clock: Arc<dyn Clock>,
    settings: PipelineSettings,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("extractor", &self.extractor)
            .field("parser", &self.parser)
            .field("repository", &self.repository.describe())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    pub fn new(
        extractor: Extractor,
        parser: ParserAdapter,
        repository: Arc<dyn AddressRepository>,
        archiver: Archiver,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            extractor,
            parser,
            repository,
            archiver,
            clock: Arc::new(SystemClock),
            settings,
        }
    }

    /// Clock used for processing timestamps and artifact names
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn extractor(&self) -> &Extractor {
        &self.extractor
    }

    pub fn parser(&self) -> &ParserAdapter {
        &self.parser
    }

    pub fn repository(&self) -> &Arc<dyn AddressRepository> {
        &self.repository
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Process every discovered file.
    ///
    /// Only an unreachable store or an unreadable input directory fail the
    /// run; file failures are reported in the summary.
    pub async fn run(&self, cancel: &CancellationFlag) -> Result<RunSummary> {
        let mut summary = RunSummary::new(Utc::now());

        self.repository.check().await?;
        self.repository.ensure_schema().await?;

        let files = self.extractor.discover()?;
        info!(
            files = files.len(),
            input_dir = %self.extractor.input_dir().display(),
            store = %self.repository.describe(),
            "Starting run"
        );

        let outcomes: Vec<(PathBuf, Option<FileOutcome>)> = stream::iter(files)
            .map(|path| async move {
                if cancel.is_cancelled() {
                    return (path, None);
                }
                let outcome = self.process_file(&path).await;
                (path, Some(outcome))
            })
            .buffered(self.settings.max_concurrent_files.max(1))
            .collect()
            .await;

        for (path, outcome) in outcomes {
            match outcome {
                Some(outcome) => summary.record(outcome),
                None => summary.skip(path),
            }
        }
        summary.cancelled |= cancel.is_cancelled();
        summary.finished_at = Utc::now();

        info!(
            files_processed = summary.files_processed,
            files_failed = summary.files_failed,
            skipped = summary.skipped.len(),
            rows_persisted = summary.rows_persisted,
            rows_failed_parse = summary.rows_failed_parse,
            "Run finished"
        );
        Ok(summary)
    }

    /// Take one file through the whole state machine. Never fails: every
    /// error ends up in the outcome.
    pub async fn process_file(&self, path: &Path) -> FileOutcome {
        let started = Instant::now();
        let mut outcome = FileOutcome::new(path);
        let span = info_span!("file", file = %outcome.file_name());

        async {
            info!("Processing file");
            match self.ingest(path, &mut outcome).await {
                Ok(()) => {
                    outcome.state = FileState::Reached(FileStage::Persisted);
                    self.archive(path, &mut outcome).await;
                }
                Err((stage, e)) => {
                    error!(stage = %stage, error = %e, "File failed");
                    outcome.state = FileState::Failed(stage);
                    outcome.errors.push(e.to_string());
                }
            }
            info!(
                state = %outcome.state,
                rows = outcome.rows.total,
                inserted = outcome.rows.inserted,
                updated = outcome.rows.updated,
                parse_failed = outcome.rows.parsed_failed,
                "File done"
            );
        }
        .instrument(span)
        .await;

        outcome.duration_ms = started.elapsed().as_millis() as u64;
        outcome
    }

    /// Extract, parse, enrich, write and commit one file
    async fn ingest(&self, path: &Path, outcome: &mut FileOutcome) -> std::result::Result<(), StageError> {
        let mut stream = self.extractor.open(path).map_err(at(FileStage::Extracted))?;

        let now = self.clock.now().map_err(at(FileStage::Enriched))?;
        let mut writer = OutputWriter::create(
            &self.settings.output_dir,
            path,
            self.settings.output_format,
            now,
        )
        .map_err(at(FileStage::Enriched))?;
        let output_path = writer.path().to_path_buf();

        let mut batch = match self.repository.begin_batch(&outcome.file_name()).await {
            Ok(batch) => batch,
            Err(e) => {
                writer.discard();
                return Err((FileStage::Persisted, e));
            }
        };

        let enricher = Enricher::new(
            outcome.file_name(),
            self.clock.as_ref(),
            self.settings.extracted_by.clone(),
        );
        let staged = self
            .stage_chunks(&mut stream, &enricher, &mut writer, batch.as_mut(), outcome)
            .await;
        if let Err(e) = staged {
            batch.abort().await;
            writer.discard();
            return Err(e);
        }
        outcome.state = FileState::Reached(FileStage::Enriched);

        if let Err(e) = writer.finish() {
            batch.abort().await;
            remove_output(&output_path);
            return Err((FileStage::Enriched, e));
        }

        let result = match batch.commit().await {
            Ok(result) => result,
            Err(e) => {
                remove_output(&output_path);
                return Err((FileStage::Persisted, e));
            }
        };

        outcome.rows.inserted = result.inserted;
        outcome.rows.updated = result.updated;
        outcome.rows.rejected += result.failed.len();
        for failure in &result.failed {
            warn!(source_id = %failure.source_id, error = %failure.error, "Row not persisted");
        }
        outcome.failed_rows.extend(result.failed);
        outcome.output = Some(output_path);
        Ok(())
    }

    async fn stage_chunks(
        &self,
        stream: &mut RecordStream,
        enricher: &Enricher<'_>,
        writer: &mut OutputWriter,
        batch: &mut dyn UpsertBatch,
        outcome: &mut FileOutcome,
    ) -> std::result::Result<(), StageError> {
        while let Some(chunk) = stream.next_chunk().map_err(at(FileStage::Extracted))? {
            outcome.rows.total += chunk.len();
            outcome.rows.rejected += chunk.rejected.len();
            for rejection in &chunk.rejected {
                warn!(row = rejection.row_number, reason = %rejection.reason, "Row rejected");
            }
            outcome.rejected_rows.extend(chunk.rejected);

            let parsed = self
                .parser
                .parse_chunk(chunk.records)
                .await
                .map_err(at(FileStage::Parsed))?;
            for record in parsed.iter().filter(|r| !r.is_ok()) {
                warn!(
                    source_id = %record.source_id(),
                    error = record.parse_error().unwrap_or_default(),
                    "Row failed to parse"
                );
                outcome.failed_rows.push(RowFailure::new(
                    record.source_id(),
                    record.parse_error().unwrap_or_default(),
                ));
            }
            let failed = parsed.iter().filter(|r| !r.is_ok()).count();
            outcome.rows.parsed_failed += failed;
            outcome.rows.parsed_ok += parsed.len() - failed;

            let enriched = enricher.enrich_all(parsed).map_err(at(FileStage::Enriched))?;
            writer.write(&enriched).map_err(at(FileStage::Enriched))?;
            batch.stage(&enriched).await.map_err(at(FileStage::Persisted))?;
        }
        Ok(())
    }

    /// Move the input and its artifact into the archives. Failures are
    /// logged and leave the file at `PERSISTED`.
    async fn archive(&self, path: &Path, outcome: &mut FileOutcome) {
        let archiver = self.archiver.clone();
        let input = path.to_path_buf();
        let output = outcome.output.clone();

        let moved = tokio::task::spawn_blocking(move || {
            let input = archiver.archive_input(&input);
            let output = output.map(|o| archiver.archive_output(&o));
            (input, output)
        })
        .await;

        let (input, output) = match moved {
            Ok(results) => results,
            Err(e) => {
                let e = Error::archival(path.display().to_string(), e.to_string());
                warn!(error = %e, "Archival did not complete");
                outcome.errors.push(e.to_string());
                return;
            }
        };

        let mut complete = true;
        match input {
            Ok(dest) => outcome.archived_input = Some(dest),
            Err(e) => {
                warn!(error = %e, "Input archival failed");
                outcome.errors.push(e.to_string());
                complete = false;
            }
        }
        match output {
            Some(Ok(dest)) => outcome.archived_output = Some(dest),
            Some(Err(e)) => {
                warn!(error = %e, "Output archival failed");
                outcome.errors.push(e.to_string());
                complete = false;
            }
            None => {}
        }

        if complete {
            outcome.state = FileState::Reached(FileStage::Archived);
        }
    }
}
