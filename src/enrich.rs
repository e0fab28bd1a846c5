//! Enricher
//!
//! Attaches audit metadata to parsed records: the source filename, the
//! processing timestamp, the operator/host label and the completeness
//! class of the raw lines.

use crate::error::{Error, Result};
use crate::record::{EnrichedAddressRecord, ParsedAddressRecord};
use chrono::{DateTime, Utc};
use std::fmt;

/// Label used when neither config nor environment name the host
pub const UNKNOWN_EXTRACTOR: &str = "UNKNOWN";

/// Source of processing timestamps
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current UTC time
    fn now(&self) -> Result<DateTime<Utc>>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Result<DateTime<Utc>> {
        Ok(Utc::now())
    }
}

/// Clock that always returns the same instant, or always fails
#[derive(Debug, Clone)]
pub struct FixedClock {
    instant: Option<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(instant: DateTime<Utc>) -> Self {
        Self {
            instant: Some(instant),
        }
    }

    /// A clock whose every reading fails
    pub fn broken() -> Self {
        Self { instant: None }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Result<DateTime<Utc>> {
        self.instant.ok_or_else(|| Error::Clock {
            message: "fixed clock has no instant".to_string(),
        })
    }
}

/// Resolve the `extracted_by` label: configured value, else the host name
/// from `HOSTNAME` / `COMPUTERNAME`, else `UNKNOWN`. Always upper-cased.
pub fn resolve_extracted_by(configured: Option<&str>) -> String {
    configured
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| {
            ["HOSTNAME", "COMPUTERNAME"]
                .into_iter()
                .filter_map(|var| std::env::var(var).ok())
                .map(|v| v.trim().to_string())
                .find(|v| !v.is_empty())
        })
        .unwrap_or_else(|| UNKNOWN_EXTRACTOR.to_string())
        .to_uppercase()
}

/// Enrich one record.
///
/// Total apart from the clock: a clock failure is returned as-is and is
/// fatal to the file being processed.
pub fn enrich(
    parsed: ParsedAddressRecord,
    filename: &str,
    clock: &dyn Clock,
    extracted_by: &str,
) -> Result<EnrichedAddressRecord> {
    let processed_timestamp = clock.now()?;
    Ok(EnrichedAddressRecord::new(
        parsed,
        filename.to_string(),
        processed_timestamp,
        extracted_by.to_string(),
    ))
}

/// Enricher bound to one input file
#[derive(Debug, Clone)]
pub struct Enricher<'a> {
    filename: String,
    clock: &'a dyn Clock,
    extracted_by: String,
}

impl<'a> Enricher<'a> {
    pub fn new(filename: impl Into<String>, clock: &'a dyn Clock, extracted_by: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            clock,
            extracted_by: extracted_by.into(),
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Enrich a chunk of parsed records, preserving order
    pub fn enrich_all(&self, parsed: Vec<ParsedAddressRecord>) -> Result<Vec<EnrichedAddressRecord>> {
        parsed
            .into_iter()
            .map(|p| enrich(p, &self.filename, self.clock, &self.extracted_by))
            .collect()
    }
}
