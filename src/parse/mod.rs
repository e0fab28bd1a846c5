//! Parser adapter
//!
//! Maps free-text addresses to structured components through an external
//! parsing capability.
//!
//! # Overview
//!
//! ```text
//! RawAddressRecord ─► full_address ─► AddressParser ─► field mapping ─► normalize ─► ParsedAddressRecord
//! ```
//!
//! - `AddressParser` is the capability seam (`HttpAddressParser`,
//!   `HeuristicParser`, or a stub in tests)
//! - `ParserAdapter` guarantees one parsed record per input and isolates
//!   row failures, in single-row and batch mode alike
//! - `normalize` maps countries to ISO codes and fills gaps from raw lines

mod adapter;
pub mod normalize;
mod parsers;
mod types;

pub use adapter::{AddressParser, ParserAdapter, EMPTY_ADDRESS};
pub use normalize::Normalizer;
pub use parsers::{HeuristicParser, HttpAddressParser};
pub use types::{
    component_for_field, map_components, NormalizeOptions, ParserAdapterConfig, RawComponents,
    DEFAULT_ROW_TIMEOUT,
};
