//! Helpers shared by the integration tests.
//!
//! Files here are written with `arrow-ipc` directly so the read path is
//! checked against the reference encoder rather than our own writer.
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow_array::types::Int32Type;
use arrow_array::{
    ArrayRef, BooleanArray, Date32Array, Float64Array, Int32Array, Int64Array, ListArray,
    RecordBatch, StringArray,
};
use arrow_ipc::writer::{FileWriter, StreamWriter};
use arrow_schema::{DataType, Field, Schema, SchemaRef};
use batchview_ipc::IpcMode;

/// Write batches using the arrow encoder for `mode`.
pub fn write_with_arrow(
    path: &Path,
    mode: IpcMode,
    schema: &SchemaRef,
    batches: &[RecordBatch],
) {
    let file = File::create(path).unwrap();
    match mode {
        IpcMode::File => {
            let mut writer = FileWriter::try_new(file, schema).unwrap();
            for batch in batches {
                writer.write(batch).unwrap();
            }
            writer.finish().unwrap();
        }
        IpcMode::Stream => {
            let mut writer = StreamWriter::try_new(file, schema).unwrap();
            for batch in batches {
                writer.write(batch).unwrap();
            }
            writer.finish().unwrap();
        }
    }
}

/// 3 rows, `id: Int32`, `name: Utf8`: (1, "a"), (2, "b"), (3, "c").
pub fn scenario_batch() -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int32, false),
        Field::new("name", DataType::Utf8, false),
    ]));
    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Int32Array::from(vec![1, 2, 3])) as ArrayRef,
            Arc::new(StringArray::from(vec!["a", "b", "c"])) as ArrayRef,
        ],
    )
    .unwrap()
}

pub fn mixed_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("score", DataType::Float64, true),
        Field::new("active", DataType::Boolean, true),
        Field::new("label", DataType::Utf8, true),
        Field::new("day", DataType::Date32, true),
        Field::new(
            "tags",
            DataType::List(Arc::new(Field::new("item", DataType::Int32, true))),
            true,
        ),
    ]))
}

/// A batch over `mixed_schema` with nulls sprinkled in, ids starting at
/// `start`.
pub fn mixed_batch(start: i64, len: usize) -> RecordBatch {
    let ids: Vec<i64> = (0..len as i64).map(|i| start + i).collect();
    let scores: Vec<Option<f64>> = (0..len)
        .map(|i| if i % 3 == 2 { None } else { Some(i as f64 * 1.5) })
        .collect();
    let active: Vec<Option<bool>> = (0..len)
        .map(|i| if i % 4 == 3 { None } else { Some(i % 2 == 0) })
        .collect();
    let labels: Vec<Option<String>> = (0..len)
        .map(|i| {
            if i % 5 == 4 {
                None
            } else {
                Some(format!("row-{}", start + i as i64))
            }
        })
        .collect();
    let days: Vec<Option<i32>> = (0..len)
        .map(|i| if i % 2 == 1 { None } else { Some(19000 + i as i32) })
        .collect();
    let tags = ListArray::from_iter_primitive::<Int32Type, _, _>((0..len).map(|i| {
        if i % 3 == 1 {
            None
        } else {
            Some((0..i as i32 % 3).map(Some).collect::<Vec<_>>())
        }
    }));

    RecordBatch::try_new(
        mixed_schema(),
        vec![
            Arc::new(Int64Array::from(ids)) as ArrayRef,
            Arc::new(Float64Array::from(scores)) as ArrayRef,
            Arc::new(BooleanArray::from(active)) as ArrayRef,
            Arc::new(StringArray::from(labels)) as ArrayRef,
            Arc::new(Date32Array::from(days)) as ArrayRef,
            Arc::new(tags) as ArrayRef,
        ],
    )
    .unwrap()
}
