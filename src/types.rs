//! Common types used throughout the address pipeline
//!
//! This module contains shared enums and small utility traits used across
//! the record model, the repository and the orchestrator.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Parse Status
// ============================================================================

/// Outcome of parsing one address row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ParseStatus {
    /// The parsing capability produced components for the row
    Ok,
    /// The row could not be parsed; `parse_error` holds the reason
    Failed,
}

impl ParseStatus {
    /// Stored/displayed form
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for ParseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Completeness
// ============================================================================

/// How many of the three raw address lines were filled in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Completeness {
    /// All three address lines present
    Perfect,
    /// Some but not all address lines present
    Partial,
    /// No address line present
    Invalid,
}

impl Completeness {
    /// Classify a set of address lines
    pub fn classify<'a>(lines: impl IntoIterator<Item = Option<&'a str>>) -> Self {
        let mut total = 0;
        let mut filled = 0;
        for line in lines {
            total += 1;
            if line.is_some_and(|l| !l.trim().is_empty()) {
                filled += 1;
            }
        }

        match filled {
            0 => Self::Invalid,
            n if n == total => Self::Perfect,
            _ => Self::Partial,
        }
    }

    /// Stored/displayed form
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Perfect => "PERFECT",
            Self::Partial => "PARTIAL",
            Self::Invalid => "INVALID",
        }
    }
}

impl fmt::Display for Completeness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// File Stage
// ============================================================================

/// Stage a file reaches in the per-file state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FileStage {
    Discovered,
    Extracted,
    Parsed,
    Enriched,
    Persisted,
    Archived,
}

impl FileStage {
    /// Stored/displayed form
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Discovered => "DISCOVERED",
            Self::Extracted => "EXTRACTED",
            Self::Parsed => "PARSED",
            Self::Enriched => "ENRICHED",
            Self::Persisted => "PERSISTED",
            Self::Archived => "ARCHIVED",
        }
    }
}

impl fmt::Display for FileStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Output Format
// ============================================================================

/// Format of the processed output artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Comma-separated values with a header row
    #[default]
    Csv,
    /// Parquet file with a fixed Arrow schema
    Parquet,
    /// Single-sheet Excel workbook with a header row
    Xlsx,
}

impl OutputFormat {
    /// File extension (without dot)
    pub fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Parquet => "parquet",
            Self::Xlsx => "xlsx",
        }
    }
}

// ============================================================================
// Backoff Type
// ============================================================================

/// Type of backoff for retries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffType {
    /// Constant delay between retries
    Constant,
    /// Linear increase in delay
    Linear,
    /// Exponential increase in delay
    #[default]
    Exponential,
}

// ============================================================================
// Utilities
// ============================================================================

/// Extension trait for optional strings coming out of spreadsheet cells
pub trait OptionStringExt {
    /// Returns None if the string is empty or only whitespace, trimmed otherwise
    fn none_if_blank(self) -> Option<String>;
}

impl OptionStringExt for Option<String> {
    fn none_if_blank(self) -> Option<String> {
        self.and_then(OptionStringExt::none_if_blank)
    }
}

impl OptionStringExt for String {
    fn none_if_blank(self) -> Option<String> {
        let trimmed = self.trim();
        if trimmed.is_empty() {
            None
        } else if trimmed.len() == self.len() {
            Some(self)
        } else {
            Some(trimmed.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status_serde() {
        let status: ParseStatus = serde_json::from_str("\"FAILED\"").unwrap();
        assert_eq!(status, ParseStatus::Failed);
        assert_eq!(serde_json::to_string(&ParseStatus::Ok).unwrap(), "\"OK\"");
    }

    #[test]
    fn test_completeness_classify() {
        assert_eq!(
            Completeness::classify([Some("1 Main St"), Some("Springfield"), Some("IL")]),
            Completeness::Perfect
        );
        assert_eq!(
            Completeness::classify([Some("1 Main St"), None, Some("  ")]),
            Completeness::Partial
        );
        assert_eq!(
            Completeness::classify([Some(""), None, None]),
            Completeness::Invalid
        );
    }

    #[test]
    fn test_file_stage_order() {
        assert!(FileStage::Extracted < FileStage::Persisted);
        assert_eq!(FileStage::Archived.to_string(), "ARCHIVED");
    }

    #[test]
    fn test_output_format_extension() {
        assert_eq!(OutputFormat::default(), OutputFormat::Csv);
        assert_eq!(OutputFormat::Parquet.extension(), "parquet");
        assert_eq!(OutputFormat::Xlsx.extension(), "xlsx");
    }

    #[test]
    fn test_option_string_none_if_blank() {
        assert_eq!(
            Some(" Apt 2 ".to_string()).none_if_blank(),
            Some("Apt 2".to_string())
        );
        assert_eq!(Some("   ".to_string()).none_if_blank(), None);
        assert_eq!(None::<String>.none_if_blank(), None);
        assert_eq!("x".to_string().none_if_blank(), Some("x".to_string()));
    }
}
