//! Parser adapter types and capability field mapping

use crate::error::{Error, Result};
use crate::record::{Component, Components};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Untyped output of a parsing capability: field name to value
pub type RawComponents = serde_json::Map<String, Value>;

/// Default per-row parser timeout
pub const DEFAULT_ROW_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// Normalization Options
// ============================================================================

/// Post-processing applied to parsed components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeOptions {
    /// Map country names and codes to ISO 3166 alpha-2
    pub country_codes: bool,
    /// Infer a missing country from line 3, the state code or a UK postcode
    pub infer_country: bool,
    /// Fill missing municipality / state / postal code from raw lines 2 and 3
    pub line_fallbacks: bool,
    /// Upper-case every component value
    pub uppercase: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            country_codes: true,
            infer_country: true,
            line_fallbacks: false,
            uppercase: false,
        }
    }
}

impl NormalizeOptions {
    /// No post-processing at all
    pub fn none() -> Self {
        Self {
            country_codes: false,
            infer_country: false,
            line_fallbacks: false,
            uppercase: false,
        }
    }
}

// ============================================================================
// Adapter Config
// ============================================================================

/// Settings for the parser adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserAdapterConfig {
    /// Budget for one row; a batch call gets `row_timeout * rows`
    pub row_timeout: Duration,
    /// Send whole chunks to the capability instead of one row at a time
    pub batch: bool,
    pub normalize: NormalizeOptions,
}

impl Default for ParserAdapterConfig {
    fn default() -> Self {
        Self {
            row_timeout: DEFAULT_ROW_TIMEOUT,
            batch: true,
            normalize: NormalizeOptions::default(),
        }
    }
}

impl ParserAdapterConfig {
    #[must_use]
    pub fn with_row_timeout(mut self, timeout: Duration) -> Self {
        self.row_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_batch(mut self, batch: bool) -> Self {
        self.batch = batch;
        self
    }

    #[must_use]
    pub fn with_normalize(mut self, normalize: NormalizeOptions) -> Self {
        self.normalize = normalize;
        self
    }
}

// ============================================================================
// Field Mapping
// ============================================================================

/// Map a capability field name to a component.
///
/// Matching ignores case and the separators `_`, `-` and space, so
/// `house_number`, `HouseNumber` and `house-number` are the same field.
pub fn component_for_field(field: &str) -> Option<Component> {
    let key: String = field
        .chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect();

    let component = match key.as_str() {
        "housenumber" | "streetnumber" => Component::StreetNumber,
        "road" | "streetname" | "street" => Component::StreetName,
        "unit" | "apartment" | "suite" => Component::Unit,
        "city" | "municipality" | "town" => Component::Municipality,
        "state" | "province" | "provinceorstate" | "region" => Component::ProvinceOrState,
        "postcode" | "postalcode" | "zip" | "zipcode" => Component::PostalCode,
        "country" => Component::Country,
        "orientation" => Component::Orientation,
        "generaldelivery" => Component::GeneralDelivery,
        _ => return None,
    };
    Some(component)
}

/// Convert capability output into typed components.
///
/// Unknown fields, nulls and blank strings are dropped. A non-scalar value
/// for a known field makes the whole output malformed. When two aliases of
/// the same component are present the first non-blank one wins.
pub fn map_components(raw: &RawComponents) -> Result<Components> {
    let mut components = Components::new();

    for (field, value) in raw {
        let Some(component) = component_for_field(field) else {
            continue;
        };

        let text = match value {
            Value::Null => continue,
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Array(_) | Value::Object(_) => {
                return Err(Error::row_parse(format!(
                    "malformed parser output: field '{field}' is not a scalar"
                )));
            }
        };

        if !text.is_empty() {
            components.entry(component).or_insert(text);
        }
    }

    Ok(components)
}
