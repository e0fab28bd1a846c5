//! CLI commands and argument parsing

use crate::config::ConfigOverrides;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Address normalization pipeline
#[derive(Parser, Debug)]
#[command(name = "addr-pipeline")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Pipeline configuration file (YAML)
    #[arg(
        short,
        long,
        global = true,
        env = "ADDR_PIPELINE_CONFIG",
        default_value = "pipeline.yaml"
    )]
    pub config: PathBuf,

    /// Report format
    #[arg(short, long, global = true, default_value = "pretty")]
    pub format: ReportFormat,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(flatten)]
    pub overrides: OverrideArgs,

    /// Defaults to `run`
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// CLI subcommands
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Process every file in the input directory
    Run,

    /// Validate config, connect to the store, ensure the table, ping the parser
    Check,

    /// List the input files a run would process
    Discover,

    /// Load and validate the config only
    Validate,
}

/// Settings that replace config file values
#[derive(Args, Debug, Default, Clone)]
pub struct OverrideArgs {
    /// Input directory
    #[arg(long, global = true, env = "ADDR_PIPELINE_INPUT_DIR")]
    pub input_dir: Option<PathBuf>,

    /// Output directory
    #[arg(long, global = true, env = "ADDR_PIPELINE_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Store URL (`:memory:`, DuckDB path, `sqlite://`, `postgres://`)
    #[arg(long, global = true, env = "ADDR_PIPELINE_DATABASE_URL")]
    pub database_url: Option<String>,

    /// Rows per chunk
    #[arg(long, global = true)]
    pub batch_size: Option<usize>,

    /// Files processed concurrently
    #[arg(long, global = true)]
    pub max_concurrent_files: Option<usize>,

    /// Output artifact format
    #[arg(long, global = true)]
    pub output_format: Option<ArtifactFormat>,
}

impl From<OverrideArgs> for ConfigOverrides {
    fn from(args: OverrideArgs) -> Self {
        Self {
            input_dir: args.input_dir,
            output_dir: args.output_dir,
            database_url: args.database_url,
            batch_size: args.batch_size,
            max_concurrent_files: args.max_concurrent_files,
            output_format: args.output_format.map(Into::into),
        }
    }
}

/// Report format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ReportFormat {
    /// One JSON document
    Json,
    /// Human-readable text
    Pretty,
}

/// Output artifact format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ArtifactFormat {
    Csv,
    Parquet,
    Xlsx,
}

impl From<ArtifactFormat> for crate::types::OutputFormat {
    fn from(format: ArtifactFormat) -> Self {
        match format {
            ArtifactFormat::Csv => Self::Csv,
            ArtifactFormat::Parquet => Self::Parquet,
            ArtifactFormat::Xlsx => Self::Xlsx,
        }
    }
}
