//! Record types

use crate::error::{Error, Result};
use crate::types::{Completeness, ParseStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Separator used when joining address lines into one parser input
pub const ADDRESS_LINE_SEPARATOR: &str = ", ";

// ============================================================================
// Components
// ============================================================================

/// Name of a structured address component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    StreetNumber,
    StreetName,
    Unit,
    Municipality,
    ProvinceOrState,
    PostalCode,
    Country,
    Orientation,
    GeneralDelivery,
}

impl Component {
    /// All components, in column order
    pub const ALL: [Component; 9] = [
        Component::StreetNumber,
        Component::StreetName,
        Component::Unit,
        Component::Municipality,
        Component::ProvinceOrState,
        Component::PostalCode,
        Component::Country,
        Component::Orientation,
        Component::GeneralDelivery,
    ];

    /// Canonical snake_case name, also used as the column name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StreetNumber => "street_number",
            Self::StreetName => "street_name",
            Self::Unit => "unit",
            Self::Municipality => "municipality",
            Self::ProvinceOrState => "province_or_state",
            Self::PostalCode => "postal_code",
            Self::Country => "country",
            Self::Orientation => "orientation",
            Self::GeneralDelivery => "general_delivery",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Component {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| Error::Other(format!("Unknown address component: {s}")))
    }
}

/// Parsed components, keyed by component name. Only components the parser
/// emitted are present.
pub type Components = BTreeMap<Component, String>;

// ============================================================================
// Raw Record
// ============================================================================

/// One address row read from an input file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAddressRecord {
    /// Business key from the `ID` column (trimmed, never empty)
    pub source_id: String,
    /// `ADDRESSLINE1`
    pub address_line_1: String,
    /// `ADDRESSLINE2`, if present and non-blank
    pub address_line_2: Option<String>,
    /// `ADDRESSLINE3`, if present and non-blank
    pub address_line_3: Option<String>,
    /// Path of the file the row came from
    pub origin_file: String,
    /// 1-based data row number within the file (header excluded)
    pub row_number: usize,
}

impl RawAddressRecord {
    /// Create a record with only the first address line
    pub fn new(
        source_id: impl Into<String>,
        address_line_1: impl Into<String>,
        origin_file: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            address_line_1: address_line_1.into(),
            address_line_2: None,
            address_line_3: None,
            origin_file: origin_file.into(),
            row_number: 0,
        }
    }

    /// Set the second address line
    #[must_use]
    pub fn with_line_2(mut self, line: impl Into<String>) -> Self {
        self.address_line_2 = Some(line.into());
        self
    }

    /// Set the third address line
    #[must_use]
    pub fn with_line_3(mut self, line: impl Into<String>) -> Self {
        self.address_line_3 = Some(line.into());
        self
    }

    /// Set the row number
    #[must_use]
    pub fn with_row_number(mut self, row_number: usize) -> Self {
        self.row_number = row_number;
        self
    }

    /// The three address lines in order
    pub fn lines(&self) -> [Option<&str>; 3] {
        [
            Some(self.address_line_1.as_str()),
            self.address_line_2.as_deref(),
            self.address_line_3.as_deref(),
        ]
    }

    /// Join the non-blank address lines into the single parser input string
    pub fn full_address(&self) -> String {
        self.lines()
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join(ADDRESS_LINE_SEPARATOR)
    }

    /// How many address lines were filled in
    pub fn completeness(&self) -> Completeness {
        Completeness::classify(self.lines())
    }
}

// ============================================================================
// Parsed Record
// ============================================================================

/// A raw record plus the result of running it through the parser
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedAddressRecord {
    raw: RawAddressRecord,
    full_address: String,
    components: Components,
    parse_status: ParseStatus,
    parse_error: Option<String>,
}

impl ParsedAddressRecord {
    /// A successfully parsed record
    pub fn ok(raw: RawAddressRecord, components: Components) -> Self {
        let full_address = raw.full_address();
        Self {
            raw,
            full_address,
            components,
            parse_status: ParseStatus::Ok,
            parse_error: None,
        }
    }

    /// A record whose address could not be parsed
    pub fn failed(raw: RawAddressRecord, error: impl Into<String>) -> Self {
        let full_address = raw.full_address();
        Self {
            raw,
            full_address,
            components: Components::new(),
            parse_status: ParseStatus::Failed,
            parse_error: Some(error.into()),
        }
    }

    pub fn raw(&self) -> &RawAddressRecord {
        &self.raw
    }

    pub fn source_id(&self) -> &str {
        &self.raw.source_id
    }

    /// Parser input string the components were derived from
    pub fn full_address(&self) -> &str {
        &self.full_address
    }

    pub fn components(&self) -> &Components {
        &self.components
    }

    /// Value of one component, if the parser emitted it
    pub fn component(&self, component: Component) -> Option<&str> {
        self.components.get(&component).map(String::as_str)
    }

    pub fn parse_status(&self) -> ParseStatus {
        self.parse_status
    }

    pub fn parse_error(&self) -> Option<&str> {
        self.parse_error.as_deref()
    }

    pub fn is_ok(&self) -> bool {
        self.parse_status == ParseStatus::Ok
    }
}

// ============================================================================
// Enriched Record
// ============================================================================

/// A parsed record with audit metadata attached
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrichedAddressRecord {
    parsed: ParsedAddressRecord,
    filename: String,
    processed_timestamp: DateTime<Utc>,
    extracted_by: String,
    completeness: Completeness,
}

impl EnrichedAddressRecord {
    pub(crate) fn new(
        parsed: ParsedAddressRecord,
        filename: String,
        processed_timestamp: DateTime<Utc>,
        extracted_by: String,
    ) -> Self {
        let completeness = parsed.raw().completeness();
        Self {
            parsed,
            filename,
            processed_timestamp,
            extracted_by,
            completeness,
        }
    }

    pub fn parsed(&self) -> &ParsedAddressRecord {
        &self.parsed
    }

    pub fn raw(&self) -> &RawAddressRecord {
        self.parsed.raw()
    }

    pub fn source_id(&self) -> &str {
        self.parsed.source_id()
    }

    /// Name of the input file this record was produced from
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// When this processing attempt enriched the record
    pub fn processed_timestamp(&self) -> DateTime<Utc> {
        self.processed_timestamp
    }

    pub fn extracted_by(&self) -> &str {
        &self.extracted_by
    }

    pub fn completeness(&self) -> Completeness {
        self.completeness
    }

    pub fn parse_status(&self) -> ParseStatus {
        self.parsed.parse_status()
    }
}
