//! Pipeline configuration
//!
//! Loaded from YAML. String values may reference the environment with
//! `{{ env.NAME }}`; relative paths are resolved against the directory of
//! the config file. Command-line overrides are applied on top through
//! `ConfigOverrides`.

use crate::archive::Archiver;
use crate::enrich::{resolve_extracted_by, SystemClock};
use crate::error::{Error, Result};
use crate::extract::{Extractor, DEFAULT_CHUNK_SIZE};
use crate::http::{HttpClientConfig, RateLimiterConfig};
use crate::parse::{
    AddressParser, HeuristicParser, HttpAddressParser, NormalizeOptions, ParserAdapter,
    ParserAdapterConfig,
};
use crate::pipeline::{Pipeline, PipelineSettings};
use crate::repository::{is_valid_table_name, DuckDbConfig, DuckDbRepository, StoreTarget, DEFAULT_TABLE};
use crate::template::{self, TemplateContext};
use crate::types::OutputFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

// ============================================================================
// Top-Level Config
// ============================================================================

/// Complete pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Directory scanned for input spreadsheets
    pub input_dir: PathBuf,

    /// Directory receiving output artifacts
    pub output_dir: PathBuf,

    #[serde(default)]
    pub archive: ArchiveConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub parser: ParserConfig,

    /// Budget for parsing one row
    #[serde(default = "default_row_timeout_ms")]
    pub row_timeout_ms: u64,

    /// Budget for one database operation
    #[serde(default = "default_db_timeout_secs")]
    pub db_timeout_secs: u64,

    /// Rows per chunk
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_max_concurrent_files")]
    pub max_concurrent_files: usize,

    /// Operator/host label; the host name when absent
    #[serde(default)]
    pub extracted_by: Option<String>,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub normalize: NormalizeOptions,
}

fn default_row_timeout_ms() -> u64 {
    10_000
}

fn default_db_timeout_secs() -> u64 {
    60
}

fn default_batch_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_max_concurrent_files() -> usize {
    1
}

fn default_true() -> bool {
    true
}

// ============================================================================
// Sections
// ============================================================================

/// Archive directories
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    #[serde(default = "default_raw_dir")]
    pub raw_dir: PathBuf,
    #[serde(default = "default_processed_dir")]
    pub processed_dir: PathBuf,
}

fn default_raw_dir() -> PathBuf {
    PathBuf::from("archive/raw")
}

fn default_processed_dir() -> PathBuf {
    PathBuf::from("archive/processed")
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            raw_dir: default_raw_dir(),
            processed_dir: default_processed_dir(),
        }
    }
}

/// Target store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// `:memory:`, a DuckDB file path, `duckdb://`, `sqlite://` or
    /// `postgres://` URL
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_table_name")]
    pub table_name: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

fn default_database_url() -> String {
    "addresses.duckdb".to_string()
}

fn default_table_name() -> String {
    DEFAULT_TABLE.to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            table_name: default_table_name(),
            username: None,
            password: None,
        }
    }
}

/// Which address parser to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParserKind {
    /// Remote parsing service
    Http,
    /// Built-in rule-based parser
    #[default]
    Heuristic,
}

/// Address parser settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserConfig {
    #[serde(default)]
    pub kind: ParserKind,
    /// Parsing service URL (HTTP parser only)
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Bearer token for the parsing service
    #[serde(default)]
    pub api_token: Option<String>,
    /// Send whole chunks per request
    #[serde(default = "default_true")]
    pub batch: bool,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub requests_per_second: Option<u32>,
}

fn default_max_retries() -> u32 {
    3
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            kind: ParserKind::default(),
            endpoint: None,
            api_token: None,
            batch: true,
            max_retries: default_max_retries(),
            requests_per_second: None,
        }
    }
}

/// Output artifact settings
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
}

/// Values given on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub input_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub database_url: Option<String>,
    pub batch_size: Option<usize>,
    pub max_concurrent_files: Option<usize>,
    pub output_format: Option<OutputFormat>,
}

// ============================================================================
// Loading
// ============================================================================

impl PipelineConfig {
    /// Load, interpolate, resolve and validate a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let config = Self::read(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Load, interpolate and resolve a config file without validating it
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                Error::config(format!("Failed to read config '{}': {e}", path.display()))
            }
        })?;

        let mut config = Self::from_yaml_str(&content, &TemplateContext::from_env())?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.resolve_paths(base);

        debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Parse YAML and interpolate templates, without resolving or validating
    pub fn from_yaml_str(yaml: &str, ctx: &TemplateContext) -> Result<Self> {
        let raw: serde_json::Value = serde_yaml::from_str(yaml)
            .map_err(|e| Error::config(format!("Failed to parse config YAML: {e}")))?;
        let rendered = template::render_value(&raw, ctx)?;
        serde_json::from_value(rendered)
            .map_err(|e| Error::config(format!("Invalid config: {e}")))
    }

    /// Make relative paths relative to `base`
    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.input_dir);
        resolve(&mut self.output_dir);
        resolve(&mut self.archive.raw_dir);
        resolve(&mut self.archive.processed_dir);
        self.database.url = resolve_database_url(&self.database.url, base);
    }

    /// Apply command-line overrides
    pub fn apply(&mut self, overrides: ConfigOverrides) {
        if let Some(dir) = overrides.input_dir {
            self.input_dir = dir;
        }
        if let Some(dir) = overrides.output_dir {
            self.output_dir = dir;
        }
        if let Some(url) = overrides.database_url {
            self.database.url = url;
        }
        if let Some(n) = overrides.batch_size {
            self.batch_size = n;
        }
        if let Some(n) = overrides.max_concurrent_files {
            self.max_concurrent_files = n;
        }
        if let Some(format) = overrides.output_format {
            self.output.format = format;
        }
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        for (field, path) in [
            ("input_dir", &self.input_dir),
            ("output_dir", &self.output_dir),
            ("archive.raw_dir", &self.archive.raw_dir),
            ("archive.processed_dir", &self.archive.processed_dir),
        ] {
            if path.as_os_str().is_empty() {
                return Err(Error::missing_field(field));
            }
        }
        if self.batch_size == 0 {
            return Err(Error::invalid_value("batch_size", "must be at least 1"));
        }
        if self.max_concurrent_files == 0 {
            return Err(Error::invalid_value(
                "max_concurrent_files",
                "must be at least 1",
            ));
        }
        if self.row_timeout_ms == 0 {
            return Err(Error::invalid_value("row_timeout_ms", "must be positive"));
        }
        if self.db_timeout_secs == 0 {
            return Err(Error::invalid_value("db_timeout_secs", "must be positive"));
        }
        if !is_valid_table_name(&self.database.table_name) {
            return Err(Error::invalid_value(
                "database.table_name",
                format!("'{}' is not a valid table name", self.database.table_name),
            ));
        }
        if self.parser.kind == ParserKind::Http
            && self.parser.endpoint.as_deref().map_or(true, |e| e.trim().is_empty())
        {
            return Err(Error::missing_field("parser.endpoint"));
        }
        self.store_target()?;
        Ok(())
    }

    // ========================================================================
    // Derived Settings
    // ========================================================================

    pub fn row_timeout(&self) -> Duration {
        Duration::from_millis(self.row_timeout_ms)
    }

    pub fn db_timeout(&self) -> Duration {
        Duration::from_secs(self.db_timeout_secs)
    }

    /// Where the target table lives, credentials applied
    pub fn store_target(&self) -> Result<StoreTarget> {
        StoreTarget::from_url(
            &self.database.url,
            self.database.username.as_deref(),
            self.database.password.as_deref(),
        )
    }

    pub fn adapter_config(&self) -> ParserAdapterConfig {
        ParserAdapterConfig::default()
            .with_row_timeout(self.row_timeout())
            .with_batch(self.parser.batch)
            .with_normalize(self.normalize)
    }

    /// HTTP client settings for the parsing service
    pub fn http_client_config(&self) -> HttpClientConfig {
        let mut builder = HttpClientConfig::builder().max_retries(self.parser.max_retries);
        builder = match self.parser.requests_per_second {
            Some(rps) => builder.rate_limit(RateLimiterConfig::per_second(rps)),
            None => builder.no_rate_limit(),
        };
        if let Some(token) = &self.parser.api_token {
            builder = builder.bearer_token(token);
        }
        builder.build()
    }

    // ========================================================================
    // Construction
    // ========================================================================

    /// The configured address parser
    pub fn build_parser(&self) -> Result<Arc<dyn AddressParser>> {
        Ok(match self.parser.kind {
            ParserKind::Heuristic => Arc::new(HeuristicParser::new()),
            ParserKind::Http => {
                let endpoint = self
                    .parser
                    .endpoint
                    .as_deref()
                    .ok_or_else(|| Error::missing_field("parser.endpoint"))?;
                Arc::new(HttpAddressParser::new(endpoint, self.http_client_config())?)
            }
        })
    }

    /// Open the configured store
    pub fn open_repository(&self) -> Result<DuckDbRepository> {
        DuckDbRepository::open(
            DuckDbConfig::new(self.store_target()?)
                .with_table(&self.database.table_name)
                .with_timeout(self.db_timeout()),
        )
    }

    /// Wire every component into a pipeline
    pub fn build_pipeline(&self) -> Result<Pipeline> {
        let extractor = Extractor::new(&self.input_dir).with_chunk_size(self.batch_size);
        let parser = ParserAdapter::new(self.build_parser()?, self.adapter_config());
        let repository = Arc::new(self.open_repository()?);
        let archiver = Archiver::new(
            &self.archive.raw_dir,
            &self.archive.processed_dir,
            Arc::new(SystemClock),
        );
        let settings = PipelineSettings::new(
            &self.output_dir,
            resolve_extracted_by(self.extracted_by.as_deref()),
        )
        .with_format(self.output.format)
        .with_max_concurrent_files(self.max_concurrent_files);

        Ok(Pipeline::new(extractor, parser, repository, archiver, settings))
    }
}

/// Resolve the path inside a file-backed database URL against `base`
fn resolve_database_url(url: &str, base: &Path) -> String {
    let trimmed = url.trim();
    if trimmed.is_empty() || trimmed.contains(":memory:") {
        return trimmed.to_string();
    }
    for scheme in ["duckdb://", "sqlite://"] {
        if let Some(path) = trimmed.strip_prefix(scheme) {
            return format!("{scheme}{}", join_relative(base, path));
        }
    }
    if trimmed.contains("://") {
        return trimmed.to_string();
    }
    join_relative(base, trimmed)
}

fn join_relative(base: &Path, path: &str) -> String {
    let p = Path::new(path);
    if p.is_relative() {
        base.join(p).display().to_string()
    } else {
        path.to_string()
    }
}
