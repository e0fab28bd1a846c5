//! Component normalization
//!
//! Post-processing applied after the parsing capability returns:
//! raw-line fallbacks, ISO country codes, country inference and casing.

use super::types::NormalizeOptions;
use crate::record::{Component, Components, RawAddressRecord};
use regex::Regex;
use std::sync::LazyLock;

/// UK postcode shape, e.g. `SW1A 1AA` or `M1 1AE`
static UK_POSTCODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b[A-Z]{1,2}\d{1,2}[A-Z]?\s*\d[A-Z]{2}\b").unwrap()
});

const US_STATES: [&str; 51] = [
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DC", "DE", "FL", "GA", "HI", "ID", "IL", "IN",
    "IA", "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH",
    "NJ", "NM", "NY", "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT",
    "VT", "VA", "WA", "WV", "WI", "WY",
];

const CA_PROVINCES: [&str; 13] = [
    "AB", "BC", "MB", "NB", "NL", "NS", "NT", "NU", "ON", "PE", "QC", "SK", "YT",
];

/// Map a country name or code to ISO 3166 alpha-2.
///
/// Returns `None` for values outside the known table.
pub fn country_code(value: &str) -> Option<&'static str> {
    let key = value.trim().trim_end_matches('.').to_lowercase();
    let code = match key.as_str() {
        "us" | "usa" | "u.s" | "u.s.a" | "united states" | "united states of america" => "US",
        "ca" | "can" | "canada" => "CA",
        "uk" | "gb" | "gbr" | "great britain" | "united kingdom" | "england" | "scotland"
        | "wales" => "GB",
        "de" | "deu" | "germany" => "DE",
        "fr" | "fra" | "france" => "FR",
        "ch" | "che" | "switzerland" => "CH",
        "bm" | "bmu" | "bermuda" => "BM",
        "gt" | "gtm" | "guatemala" => "GT",
        "il" | "isr" | "israel" => "IL",
        "ky" | "cym" | "cayman islands" => "KY",
        "no" | "nor" | "norway" => "NO",
        "pa" | "pan" | "panama" => "PA",
        _ => return None,
    };
    Some(code)
}

/// Country implied by a US state or Canadian province code
pub fn country_for_region(region: &str) -> Option<&'static str> {
    let region = region.trim().to_uppercase();
    if US_STATES.contains(&region.as_str()) {
        Some("US")
    } else if CA_PROVINCES.contains(&region.as_str()) {
        Some("CA")
    } else {
        None
    }
}

/// Whether the text contains something shaped like a UK postcode
pub fn has_uk_postcode(text: &str) -> bool {
    UK_POSTCODE.is_match(text)
}

/// Applies `NormalizeOptions` to parsed components
#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer {
    options: NormalizeOptions,
}

impl Normalizer {
    pub fn new(options: NormalizeOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> NormalizeOptions {
        self.options
    }

    /// Normalize components parsed from `raw`
    pub fn apply(&self, raw: &RawAddressRecord, mut components: Components) -> Components {
        if self.options.line_fallbacks {
            apply_line_fallbacks(raw, &mut components);
        }

        if self.options.country_codes {
            if let Some(code) = components
                .get(&Component::Country)
                .and_then(|c| country_code(c))
            {
                components.insert(Component::Country, code.to_string());
            }
        }

        if self.options.infer_country && !components.contains_key(&Component::Country) {
            if let Some(code) = infer_country(raw, &components) {
                components.insert(Component::Country, code.to_string());
            }
        }

        if self.options.uppercase {
            for value in components.values_mut() {
                *value = value.to_uppercase();
            }
        }

        components
    }
}

/// Country from line 3, then the state/province code, then a UK postcode
fn infer_country(raw: &RawAddressRecord, components: &Components) -> Option<&'static str> {
    raw.address_line_3
        .as_deref()
        .and_then(country_code)
        .or_else(|| {
            components
                .get(&Component::ProvinceOrState)
                .and_then(|s| country_for_region(s))
        })
        .or_else(|| has_uk_postcode(&raw.full_address()).then_some("GB"))
}

/// Fill missing locality fields from the raw lines.
///
/// Line 2 supplies the municipality: the text before the first comma, or
/// the line without its last two words (`Springfield IL 62701` gives
/// `Springfield`). Line 3 is read as `STATE POSTCODE`.
fn apply_line_fallbacks(raw: &RawAddressRecord, components: &mut Components) {
    if let Some(line) = raw.address_line_2.as_deref().map(str::trim) {
        if !line.is_empty() && !components.contains_key(&Component::Municipality) {
            let city = match line.split_once(',') {
                Some((head, _)) => head.trim().to_string(),
                None => {
                    let words: Vec<&str> = line.split_whitespace().collect();
                    let keep = words.len().saturating_sub(2).max(1);
                    words[..keep.min(words.len())].join(" ")
                }
            };
            if !city.is_empty() {
                components.insert(Component::Municipality, city);
            }
        }
    }

    if let Some(line) = raw.address_line_3.as_deref().map(str::trim) {
        let mut parts = line.splitn(2, char::is_whitespace);
        let state = parts.next().filter(|s| !s.is_empty());
        let postcode = parts.next().map(str::trim).filter(|s| !s.is_empty());

        if let Some(state) = state {
            components
                .entry(Component::ProvinceOrState)
                .or_insert_with(|| state.to_string());
        }
        if let Some(postcode) = postcode {
            components
                .entry(Component::PostalCode)
                .or_insert_with(|| postcode.to_string());
        }
    }
}
