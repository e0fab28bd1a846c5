//! Address repository
//!
//! Idempotent upsert of enriched records keyed by `source_id`. A file's
//! rows are staged into a batch and committed together: either every
//! staged row is merged into the target table or none is.
//!
//! Backends:
//! - `DuckDbRepository`: DuckDB file or memory, or PostgreSQL / SQLite
//!   attached through DuckDB
//! - `InMemoryRepository`: a shared map, for tests and dry runs

mod duckdb_store;
mod memory;
mod store;
mod types;

pub use duckdb_store::{mask_password, DuckDbConfig, DuckDbRepository, StoreTarget, DEFAULT_DB_TIMEOUT};
pub use memory::InMemoryRepository;
pub use store::{AddressRepository, UpsertBatch};
pub use types::{
    column_names, is_valid_table_name, partition_valid, row_values, stored_row, validate_row,
    Column, ColumnKind, RowFailure, StoredRow, UpsertResult, COLUMNS, DEFAULT_TABLE,
    MAX_SOURCE_ID_LEN, SUPERSEDED,
};
