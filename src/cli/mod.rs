//! CLI module
//!
//! Command-line interface for the address pipeline.
//!
//! # Commands
//!
//! - `run` - Process every input file (default)
//! - `check` - Verify the store and the address parser
//! - `discover` - List the files a run would process
//! - `validate` - Validate the configuration

mod commands;
mod runner;

pub use commands::{ArtifactFormat, Cli, Commands, OverrideArgs, ReportFormat};
pub use runner::{render_summary, Runner};
