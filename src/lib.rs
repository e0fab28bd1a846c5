// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::match_wildcard_for_single_variants)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # addr-pipeline
//!
//! Batch pipeline for postal addresses held in spreadsheet files. Each
//! input file is read row by row, every address is split into components
//! by an address parser, rows are stamped with audit fields, upserted into
//! a relational store keyed by source ID, written to an output artifact,
//! and finally the input and artifact are archived.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use addr_pipeline::{config::PipelineConfig, pipeline::CancellationFlag, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = PipelineConfig::load("pipeline.yaml")?;
//!     let pipeline = config.build_pipeline()?;
//!
//!     let summary = pipeline.run(&CancellationFlag::new()).await?;
//!     println!("{} rows persisted", summary.rows_persisted);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          Pipeline                               │
//! │  discover() → files    process_file() → FileOutcome             │
//! │  run(cancel) → RunSummary                                       │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//! ┌──────────┬───────────┬───────┴───────┬───────────┬─────────────┐
//! │ Extract  │  Parse    │    Enrich     │ Repository│  Archive    │
//! ├──────────┼───────────┼───────────────┼───────────┼─────────────┤
//! │ CSV      │ HTTP      │ Audit fields  │ DuckDB    │ Raw inputs  │
//! │ XLSX     │ Heuristic │ Completeness  │ Postgres  │ Artifacts   │
//! │ Schema   │ Normalize │ Clock         │ SQLite    │ Collisions  │
//! └──────────┴───────────┴───────────────┴───────────┴─────────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// Address record model
pub mod record;

/// Spreadsheet discovery and row extraction
pub mod extract;

/// HTTP client with retry and rate limiting
pub mod http;

/// Address parsing
pub mod parse;

/// Audit metadata
pub mod enrich;

/// Relational store
pub mod repository;

/// CSV, Parquet and XLSX output artifacts
pub mod output;

/// Archival of processed files
pub mod archive;

/// Per-file state machine and run orchestration
pub mod pipeline;

/// Pipeline configuration
pub mod config;

/// Template interpolation
pub mod template;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

pub use config::PipelineConfig;
pub use pipeline::{CancellationFlag, Pipeline, RunSummary};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
