//! Utilities useful for testing.
//!
//! Note these aren't placed behind an `cfg[(test)]` annotation since they
//! should be usable outside of the crate.
use std::sync::Arc;

use arrow_array::{ArrayRef, Int64Array, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema, SchemaRef};

use crate::mode::IpcMode;
use crate::table::Table;
use crate::writer::table_to_bytes;

/// `id: Int64` (not null), `name: Utf8` (nullable).
pub fn id_name_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("name", DataType::Utf8, true),
    ]))
}

pub fn id_name_batch(ids: &[i64], names: &[&str]) -> RecordBatch {
    assert_eq!(ids.len(), names.len(), "ids and names differ in length");
    RecordBatch::try_new(
        id_name_schema(),
        vec![
            Arc::new(Int64Array::from(ids.to_vec())) as ArrayRef,
            Arc::new(StringArray::from(names.to_vec())) as ArrayRef,
        ],
    )
    .unwrap()
}

/// Encode batches sharing the id/name schema.
pub fn ipc_bytes(mode: IpcMode, batches: &[RecordBatch]) -> Vec<u8> {
    let table = Table::try_new(id_name_schema(), batches.to_vec()).unwrap();
    table_to_bytes(&table, mode).unwrap()
}

/// Asserts two tables hold the same rows, ignoring how rows are split into
/// batches.
pub fn assert_tables_eq(a: &Table, b: &Table) {
    assert_eq!(a.schema(), b.schema(), "Schemas differ");
    assert_eq!(a.num_rows(), b.num_rows(), "Row counts differ");

    let a = a.concat().unwrap();
    let b = b.concat().unwrap();
    for (idx, (a_col, b_col)) in a.columns().iter().zip(b.columns()).enumerate() {
        assert_eq!(a_col, b_col, "Columns differ at index {idx}");
    }
}
