//! Error types for the address pipeline
//!
//! This module defines the error hierarchy for the entire crate.
//! All public APIs return `Result<T, Error>` where Error is defined here.
//!
//! The pipeline-level taxonomy is `Schema`, `RowParse`, `Connectivity`,
//! `Upsert` and `Archival`. Everything else is ambient plumbing that the
//! orchestrator folds into one of those outcomes.

use thiserror::Error;

/// The main error type for the address pipeline
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing required config field: {field}")]
    MissingConfigField { field: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // Pipeline Errors
    // ============================================================================
    #[error("Schema error in '{file}': missing required column(s) {}", missing.join(", "))]
    Schema { file: String, missing: Vec<String> },

    #[error("Address parse failed: {message}")]
    RowParse { message: String },

    #[error("Connectivity error: {message}")]
    Connectivity { message: String },

    #[error("Upsert failed: {message}")]
    Upsert { message: String },

    #[error("Archival of '{path}' failed: {message}")]
    Archival { path: String, message: String },

    #[error("Clock unavailable: {message}")]
    Clock { message: String },

    // ============================================================================
    // HTTP Errors
    // ============================================================================
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Rate limited, retry after {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Max retries ({max_retries}) exceeded")]
    MaxRetriesExceeded { max_retries: u32 },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ============================================================================
    // Data Errors
    // ============================================================================
    #[error("Database error: {0}")]
    Database(#[from] duckdb::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Spreadsheet error: {message}")]
    Spreadsheet { message: String },

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Output error: {message}")]
    Output { message: String },

    // ============================================================================
    // Template Errors
    // ============================================================================
    #[error("Template error: {message}")]
    Template { message: String },

    #[error("Undefined variable in template: {variable}")]
    UndefinedVariable { variable: String },

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingConfigField {
            field: field.into(),
        }
    }

    /// Create an invalid config value error
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a schema error
    pub fn schema(file: impl Into<String>, missing: Vec<String>) -> Self {
        Self::Schema {
            file: file.into(),
            missing,
        }
    }

    /// Create a row parse error
    pub fn row_parse(message: impl Into<String>) -> Self {
        Self::RowParse {
            message: message.into(),
        }
    }

    /// Create a connectivity error
    pub fn connectivity(message: impl Into<String>) -> Self {
        Self::Connectivity {
            message: message.into(),
        }
    }

    /// Create an upsert error
    pub fn upsert(message: impl Into<String>) -> Self {
        Self::Upsert {
            message: message.into(),
        }
    }

    /// Create an archival error
    pub fn archival(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Archival {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an HTTP status error
    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            body: body.into(),
        }
    }

    /// Create a spreadsheet error
    pub fn spreadsheet(message: impl Into<String>) -> Self {
        Self::Spreadsheet {
            message: message.into(),
        }
    }

    /// Create a template error
    pub fn template(message: impl Into<String>) -> Self {
        Self::Template {
            message: message.into(),
        }
    }

    /// Create an undefined variable error
    pub fn undefined_var(variable: impl Into<String>) -> Self {
        Self::UndefinedVariable {
            variable: variable.into(),
        }
    }

    /// Create an output error
    pub fn output(message: impl Into<String>) -> Self {
        Self::Output {
            message: message.into(),
        }
    }

    /// Create a timeout error from a duration
    pub fn timeout(duration: std::time::Duration) -> Self {
        Self::Timeout {
            timeout_ms: duration.as_millis() as u64,
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(_) | Error::RateLimited { .. } | Error::Timeout { .. } => true,
            Error::HttpStatus { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }

    /// Check if this error means a collaborator (parsing service, store)
    /// could not be reached or refused to serve us. Such errors fail the
    /// whole file rather than a single row.
    ///
    /// Only statuses that reject the request content (400, 413, 422) are
    /// row-level; auth, routing and server failures are not.
    pub fn is_connectivity(&self) -> bool {
        match self {
            Error::Connectivity { .. }
            | Error::Timeout { .. }
            | Error::RateLimited { .. }
            | Error::MaxRetriesExceeded { .. } => true,
            Error::Http(e) => e.is_connect() || e.is_timeout(),
            Error::HttpStatus { status, .. } => !is_content_rejection(*status),
            _ => false,
        }
    }
}

/// Check if an HTTP status code is retryable
fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Statuses that reject what was sent rather than who sent it
fn is_content_rejection(status: u16) -> bool {
    matches!(status, 400 | 413 | 422)
}

/// Result type alias for the address pipeline
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::config("test message");
        assert_eq!(err.to_string(), "Configuration error: test message");

        let err = Error::missing_field("input_dir");
        assert_eq!(err.to_string(), "Missing required config field: input_dir");

        let err = Error::schema("a.csv", vec!["ID".into(), "ADDRESSLINE1".into()]);
        assert_eq!(
            err.to_string(),
            "Schema error in 'a.csv': missing required column(s) ID, ADDRESSLINE1"
        );

        let err = Error::http_status(404, "Not found");
        assert_eq!(err.to_string(), "HTTP 404: Not found");
    }

    #[test]
    fn test_is_retryable() {
        assert!(Error::RateLimited {
            retry_after_seconds: 60
        }
        .is_retryable());
        assert!(Error::Timeout { timeout_ms: 1000 }.is_retryable());
        assert!(Error::http_status(429, "").is_retryable());
        assert!(Error::http_status(503, "").is_retryable());

        assert!(!Error::http_status(400, "").is_retryable());
        assert!(!Error::config("test").is_retryable());
    }

    #[test]
    fn test_is_connectivity() {
        assert!(Error::connectivity("down").is_connectivity());
        assert!(Error::Timeout { timeout_ms: 10 }.is_connectivity());
        assert!(Error::http_status(502, "").is_connectivity());
        assert!(Error::MaxRetriesExceeded { max_retries: 3 }.is_connectivity());

        assert!(Error::http_status(401, "unauthorized").is_connectivity());
        assert!(Error::http_status(403, "").is_connectivity());
        assert!(Error::http_status(404, "no such route").is_connectivity());

        assert!(!Error::http_status(400, "").is_connectivity());
        assert!(!Error::http_status(422, "bad address").is_connectivity());
        assert!(!Error::row_parse("no tokens").is_connectivity());
        assert!(!Error::upsert("constraint").is_connectivity());
    }
}
