//! Pipeline orchestrator
//!
//! Drives each discovered input file through the per-file state machine:
//!
//! ```text
//! DISCOVERED -> EXTRACTED -> PARSED -> ENRICHED -> PERSISTED -> ARCHIVED
//!                    \           \          \            \
//!                     +-----------+----------+------------+--> FAILED(stage)
//! ```
//!
//! Files are independent: a failing file never blocks its siblings. Rows
//! are streamed in chunks into one upsert batch per file; nothing of a file
//! is visible in the store until its batch commits, and a file is archived
//! only after that commit.

mod orchestrator;
mod types;

pub use orchestrator::Pipeline;
pub use types::{
    CancellationFlag, FileOutcome, FileState, PipelineSettings, RowCounts, RunSummary,
};
