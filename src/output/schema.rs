//! Fixed Arrow schema for output artifacts and record-to-Arrow conversion

use crate::error::Result;
use crate::record::EnrichedAddressRecord;
use crate::repository::{row_values, ColumnKind, COLUMNS};
use arrow::array::{ArrayRef, StringArray, TimestampMicrosecondArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use arrow::record_batch::RecordBatch;
use std::sync::{Arc, LazyLock};

static OUTPUT_SCHEMA: LazyLock<SchemaRef> = LazyLock::new(|| {
    let fields: Vec<Field> = COLUMNS
        .iter()
        .map(|c| match c.kind {
            ColumnKind::Key => Field::new(c.name, DataType::Utf8, false),
            ColumnKind::Text => Field::new(c.name, DataType::Utf8, true),
            ColumnKind::Timestamp => Field::new(
                c.name,
                DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
                false,
            ),
        })
        .collect();
    Arc::new(Schema::new(fields))
});

/// Schema of every output artifact: the table columns, in table order.
///
/// Text columns are `Utf8`; `processed_timestamp` is a UTC microsecond
/// timestamp.
pub fn output_schema() -> SchemaRef {
    Arc::clone(&OUTPUT_SCHEMA)
}

/// Convert enriched records to a `RecordBatch` with `output_schema()`
pub fn records_to_batch(records: &[EnrichedAddressRecord]) -> Result<RecordBatch> {
    let rows: Vec<Vec<Option<String>>> = records.iter().map(row_values).collect();

    let columns: Vec<ArrayRef> = COLUMNS
        .iter()
        .enumerate()
        .map(|(idx, column)| -> ArrayRef {
            match column.kind {
                ColumnKind::Timestamp => Arc::new(
                    TimestampMicrosecondArray::from(
                        records
                            .iter()
                            .map(|r| r.processed_timestamp().timestamp_micros())
                            .collect::<Vec<_>>(),
                    )
                    .with_timezone("UTC"),
                ),
                ColumnKind::Key | ColumnKind::Text => Arc::new(
                    rows.iter()
                        .map(|row| row[idx].as_deref())
                        .collect::<StringArray>(),
                ),
            }
        })
        .collect();

    Ok(RecordBatch::try_new(output_schema(), columns)?)
}
