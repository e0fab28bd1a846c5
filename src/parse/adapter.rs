//! Parser adapter
//!
//! Wraps an `AddressParser` capability and turns raw records into parsed
//! records, one per input, in input order. Row-level trouble (item errors,
//! malformed output, panics) is folded into a FAILED record; only
//! connectivity problems and timeouts escape to the caller.

use super::normalize::Normalizer;
use super::types::{map_components, ParserAdapterConfig, RawComponents};
use crate::error::{Error, Result};
use crate::record::{ParsedAddressRecord, RawAddressRecord};
use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, warn};

/// Reason recorded for rows with no address text
pub const EMPTY_ADDRESS: &str = "empty address";

/// An address-parsing capability: free text in, named fields out
#[async_trait]
pub trait AddressParser: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Parse one address
    async fn parse(&self, text: &str) -> Result<RawComponents>;

    /// Parse several addresses in one call.
    ///
    /// The outer error means the whole call failed; inner errors belong to
    /// single items.
    async fn parse_batch(&self, texts: &[String]) -> Result<Vec<Result<RawComponents>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.parse(text).await);
        }
        Ok(results)
    }

    /// Verify the capability is reachable
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// Turns raw records into parsed records through an `AddressParser`
#[derive(Clone)]
pub struct ParserAdapter {
    parser: Arc<dyn AddressParser>,
    config: ParserAdapterConfig,
    normalizer: Normalizer,
}

impl std::fmt::Debug for ParserAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserAdapter")
            .field("parser", &self.parser.name())
            .field("config", &self.config)
            .finish()
    }
}

impl ParserAdapter {
    pub fn new(parser: Arc<dyn AddressParser>, config: ParserAdapterConfig) -> Self {
        Self {
            parser,
            normalizer: Normalizer::new(config.normalize),
            config,
        }
    }

    pub fn parser(&self) -> &Arc<dyn AddressParser> {
        &self.parser
    }

    pub fn config(&self) -> &ParserAdapterConfig {
        &self.config
    }

    /// Parse one record
    pub async fn parse_record(&self, raw: RawAddressRecord) -> Result<ParsedAddressRecord> {
        let text = raw.full_address();
        if text.is_empty() {
            return Ok(ParsedAddressRecord::failed(raw, EMPTY_ADDRESS));
        }

        let outcome = self.call_single(&text).await?;
        Ok(self.finish(raw, outcome))
    }

    /// Parse a chunk of records, preserving order
    pub async fn parse_chunk(
        &self,
        records: Vec<RawAddressRecord>,
    ) -> Result<Vec<ParsedAddressRecord>> {
        if !self.config.batch {
            let mut parsed = Vec::with_capacity(records.len());
            for raw in records {
                parsed.push(self.parse_record(raw).await?);
            }
            return Ok(parsed);
        }

        let texts: Vec<String> = records
            .iter()
            .map(RawAddressRecord::full_address)
            .filter(|t| !t.is_empty())
            .collect();

        let mut outcomes = match self.call_batch(&texts).await? {
            Some(outcomes) => outcomes.into_iter(),
            None => {
                let mut outcomes = Vec::with_capacity(texts.len());
                for text in &texts {
                    outcomes.push(self.call_single(text).await?);
                }
                outcomes.into_iter()
            }
        };

        let mut parsed = Vec::with_capacity(records.len());
        for raw in records {
            if raw.full_address().is_empty() {
                parsed.push(ParsedAddressRecord::failed(raw, EMPTY_ADDRESS));
                continue;
            }
            let outcome = outcomes
                .next()
                .unwrap_or_else(|| Err(Error::row_parse("parser returned no result")));
            parsed.push(self.finish(raw, outcome));
        }
        Ok(parsed)
    }

    /// One capability call for one text.
    ///
    /// Outer `Err` is file-fatal, inner `Err` marks the row FAILED.
    async fn call_single(&self, text: &str) -> Result<Result<RawComponents>> {
        let call = AssertUnwindSafe(self.parser.parse(text)).catch_unwind();
        let timeout = self.config.row_timeout;

        match tokio::time::timeout(timeout, call).await {
            Err(_) => Err(Error::timeout(timeout)),
            Ok(Err(payload)) => Ok(Err(Error::row_parse(format!(
                "parser panicked: {}",
                panic_message(payload.as_ref())
            )))),
            Ok(Ok(Err(e))) if e.is_connectivity() => Err(escalate(e)),
            Ok(Ok(result)) => Ok(result),
        }
    }

    /// One capability call for a whole chunk.
    ///
    /// Returns `Ok(None)` when the caller should fall back to per-row calls.
    async fn call_batch(&self, texts: &[String]) -> Result<Option<Vec<Result<RawComponents>>>> {
        if texts.is_empty() {
            return Ok(Some(Vec::new()));
        }

        let rows = u32::try_from(texts.len()).unwrap_or(u32::MAX);
        let timeout = self.config.row_timeout.saturating_mul(rows);
        let call = AssertUnwindSafe(self.parser.parse_batch(texts)).catch_unwind();

        let results = match tokio::time::timeout(timeout, call).await {
            Err(_) => return Err(Error::timeout(timeout)),
            Ok(Err(payload)) => {
                warn!(
                    parser = self.parser.name(),
                    panic = %panic_message(payload.as_ref()),
                    "Batch parse panicked, retrying row by row"
                );
                return Ok(None);
            }
            Ok(Ok(Err(e))) if e.is_connectivity() => return Err(escalate(e)),
            Ok(Ok(Err(e))) => {
                warn!(parser = self.parser.name(), error = %e, "Batch parse failed, retrying row by row");
                return Ok(None);
            }
            Ok(Ok(Ok(results))) => results,
        };

        if results.len() != texts.len() {
            warn!(
                parser = self.parser.name(),
                expected = texts.len(),
                got = results.len(),
                "Batch parse returned wrong number of results, retrying row by row"
            );
            return Ok(None);
        }

        let mut checked = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Err(e) if e.is_connectivity() => return Err(escalate(e)),
                other => checked.push(other),
            }
        }

        debug!(parser = self.parser.name(), rows = texts.len(), "Parsed batch");
        Ok(Some(checked))
    }

    fn finish(
        &self,
        raw: RawAddressRecord,
        outcome: Result<RawComponents>,
    ) -> ParsedAddressRecord {
        match outcome.and_then(|fields| map_components(&fields)) {
            Ok(components) => {
                let components = self.normalizer.apply(&raw, components);
                ParsedAddressRecord::ok(raw, components)
            }
            Err(e) => {
                debug!(source_id = %raw.source_id, error = %e, "Row failed to parse");
                ParsedAddressRecord::failed(raw, row_error_text(&e))
            }
        }
    }
}

/// Keep timeouts as they are; everything else becomes `Connectivity`
fn escalate(e: Error) -> Error {
    match e {
        Error::Timeout { .. } | Error::Connectivity { .. } => e,
        other => Error::connectivity(format!("address parser unreachable: {other}")),
    }
}

fn row_error_text(e: &Error) -> String {
    match e {
        Error::RowParse { message } => message.clone(),
        other => other.to_string(),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
