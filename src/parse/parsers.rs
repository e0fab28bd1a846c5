//! Parsing capability implementations
//!
//! - `HttpAddressParser` talks to a remote parsing service
//! - `HeuristicParser` is a small offline splitter for demos and dry runs

use super::adapter::AddressParser;
use super::normalize::{country_code, country_for_region};
use super::types::RawComponents;
use crate::error::{Error, Result};
use crate::http::{HttpClient, HttpClientConfig, RequestConfig};
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::LazyLock;
use tracing::debug;
use url::Url;

// ============================================================================
// HTTP Parser
// ============================================================================

/// Response body of the parsing service
#[derive(Debug, Deserialize)]
struct ParseResponse {
    results: Vec<ParseResult>,
}

/// One entry of `results`: either components or an error
#[derive(Debug, Deserialize)]
struct ParseResult {
    #[serde(default)]
    components: Option<RawComponents>,
    #[serde(default)]
    error: Option<String>,
}

impl ParseResult {
    fn into_result(self) -> Result<RawComponents> {
        match (self.components, self.error) {
            (_, Some(error)) => Err(Error::row_parse(error)),
            (Some(components), None) => Ok(components),
            (None, None) => Err(Error::row_parse(
                "malformed parser output: result has neither components nor error",
            )),
        }
    }
}

/// Address parser backed by an HTTP service.
///
/// Request: `POST <endpoint>` with `{"addresses": ["...", ...]}`.
/// Response: `{"results": [{"components": {...}} | {"error": "..."}]}`,
/// one entry per address in request order.
#[derive(Debug)]
pub struct HttpAddressParser {
    client: HttpClient,
    endpoint: String,
}

impl HttpAddressParser {
    /// Create a parser for an absolute endpoint URL
    pub fn new(endpoint: &str, config: HttpClientConfig) -> Result<Self> {
        let endpoint = Url::parse(endpoint)?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(Error::invalid_value(
                "parser.endpoint",
                format!("unsupported scheme '{}'", endpoint.scheme()),
            ));
        }

        Ok(Self {
            client: HttpClient::with_config(config)?,
            endpoint: endpoint.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send(&self, texts: &[String]) -> Result<Vec<ParseResult>> {
        let request = RequestConfig::new().json(json!({ "addresses": texts }));
        let response: ParseResponse = self.client.post_json(&self.endpoint, request).await?;
        debug!(sent = texts.len(), received = response.results.len(), "Parser service replied");
        Ok(response.results)
    }
}

#[async_trait]
impl AddressParser for HttpAddressParser {
    fn name(&self) -> &str {
        "http"
    }

    async fn parse(&self, text: &str) -> Result<RawComponents> {
        let mut results = self.send(&[text.to_string()]).await?;
        if results.len() != 1 {
            return Err(Error::row_parse(format!(
                "malformed parser output: expected 1 result, got {}",
                results.len()
            )));
        }
        results.remove(0).into_result()
    }

    async fn parse_batch(&self, texts: &[String]) -> Result<Vec<Result<RawComponents>>> {
        let results = self.send(texts).await?;
        Ok(results.into_iter().map(ParseResult::into_result).collect())
    }

    async fn ping(&self) -> Result<()> {
        self.send(&[]).await.map(|_| ())
    }
}

// ============================================================================
// Heuristic Parser
// ============================================================================

static STREET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+[A-Za-z]?(?:-\d+)?)\s+(.+)$").unwrap());

static GENERAL_DELIVERY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(p\.?\s*o\.?\s*box\s+\S+|general delivery)$").unwrap()
});

static UNIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(apt|apartment|unit|suite|ste|flat|#)\.?\s*#?\s*(\S+)$").unwrap()
});

static REGION_POSTCODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z]{2})\s+([A-Za-z0-9]{3,5}(?:[ -][A-Za-z0-9]{3,4})?)$").unwrap()
});

static CITY_REGION_POSTCODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+?)\s+([A-Za-z]{2})\s+(\d{5}(?:-\d{4})?)$").unwrap()
});

static POSTCODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(\d{5}(?:-\d{4})?|[A-Z]{1,2}\d{1,2}[A-Z]?\s*\d[A-Z]{2})$").unwrap()
});

/// Comma-splitting address parser with no external dependency.
///
/// Reads `number street, [unit], [city], [STATE POSTCODE | postcode], [country]`
/// and emits fields under the names a typical parsing service uses
/// (`house_number`, `road`, `city`, ...).
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicParser;

impl HeuristicParser {
    pub fn new() -> Self {
        Self
    }

    fn split(text: &str) -> Result<RawComponents> {
        let parts: Vec<&str> = text
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();

        if !text.chars().any(char::is_alphanumeric) || parts.is_empty() {
            return Err(Error::row_parse("no address tokens"));
        }

        let mut out = RawComponents::new();
        let mut set = |key: &str, value: &str| {
            if !out.contains_key(key) {
                out.insert(key.to_string(), Value::String(value.trim().to_string()));
            }
        };

        let (first, rest) = parts.split_at(1);
        let first = first[0];
        if let Some(caps) = STREET.captures(first) {
            set("house_number", &caps[1]);
            set("road", &caps[2]);
        } else if GENERAL_DELIVERY.is_match(first) {
            set("general_delivery", first);
        } else {
            set("road", first);
        }

        for part in rest {
            if let Some(caps) = UNIT.captures(part) {
                set("unit", &caps[2]);
            } else if country_code(part).is_some() && part.len() > 2 {
                set("country", part);
            } else if let Some(caps) = CITY_REGION_POSTCODE.captures(part) {
                set("city", &caps[1]);
                set("state", &caps[2]);
                set("postcode", &caps[3]);
            } else if let Some(caps) = REGION_POSTCODE.captures(part) {
                set("state", &caps[1]);
                set("postcode", &caps[2]);
            } else if POSTCODE.is_match(part) {
                set("postcode", part);
            } else if country_for_region(part).is_some() {
                set("state", part);
            } else if country_code(part).is_some() {
                set("country", part);
            } else {
                set("city", part);
            }
        }

        Ok(out)
    }
}

#[async_trait]
impl AddressParser for HeuristicParser {
    fn name(&self) -> &str {
        "heuristic"
    }

    async fn parse(&self, text: &str) -> Result<RawComponents> {
        Self::split(text)
    }
}
