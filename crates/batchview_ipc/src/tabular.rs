//! Row oriented view over a table, for printing and inspection.
use std::fmt;

use arrow_array::cast::AsArray;
use arrow_array::types::{
    Float32Type, Float64Type, Int16Type, Int32Type, Int64Type, Int8Type, UInt16Type, UInt32Type,
    UInt64Type, UInt8Type,
};
use arrow_array::{Array, ArrayRef, RecordBatch};
use arrow_cast::display::{ArrayFormatter, FormatOptions};
use arrow_schema::{DataType, Schema};
use batchview_error::Result;

use crate::table::Table;

const FORMAT_OPTIONS: FormatOptions = FormatOptions::new().with_null("null");

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Boolean(bool),
    Int(i64),
    UInt(u64),
    Float32(f32),
    Float64(f64),
    Utf8(String),
    /// Any other type, rendered to a string.
    Formatted(String),
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Boolean(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::UInt(v) => write!(f, "{v}"),
            Self::Float32(v) => write_float(f, *v as f64, v.fract() == 0.0, v.to_string()),
            Self::Float64(v) => write_float(f, *v, v.fract() == 0.0, v.to_string()),
            Self::Utf8(v) => write!(f, "{v}"),
            Self::Formatted(v) => write!(f, "{v}"),
        }
    }
}

/// Whole floats keep a trailing `.0` so they don't read as integers.
fn write_float(f: &mut fmt::Formatter<'_>, v: f64, whole: bool, s: String) -> fmt::Result {
    if v.is_finite() && whole {
        write!(f, "{v:.1}")
    } else {
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnHeader {
    pub name: String,
    pub datatype: DataType,
    pub nullable: bool,
}

/// Dataframe-like materialization of a table.
#[derive(Debug, Clone, PartialEq)]
pub struct TabularValue {
    pub columns: Vec<ColumnHeader>,
    pub rows: Vec<Vec<CellValue>>,
}

impl TabularValue {
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&CellValue> {
        self.rows.get(row)?.get(col)
    }

    /// All values for a single column, top to bottom.
    pub fn column_values(&self, col: usize) -> Option<Vec<&CellValue>> {
        if col >= self.columns.len() {
            return None;
        }
        Some(self.rows.iter().map(|row| &row[col]).collect())
    }
}

/// Renders like a dataframe print, a leading row index and right aligned
/// columns.
impl fmt::Display for TabularValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.rows.is_empty() {
            let names: Vec<_> = self.column_names().collect();
            writeln!(f, "Empty DataFrame")?;
            writeln!(f, "Columns: [{}]", names.join(", "))?;
            return write!(f, "Index: []");
        }

        let cells: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| row.iter().map(|c| c.to_string()).collect())
            .collect();

        let index_width = (self.rows.len() - 1).to_string().len();
        let widths: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                cells
                    .iter()
                    .map(|row| row[idx].chars().count())
                    .chain(std::iter::once(col.name.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        write!(f, "{:index_width$}", "")?;
        for (col, width) in self.columns.iter().zip(&widths) {
            write!(f, "  {:>width$}", col.name)?;
        }

        for (row_idx, row) in cells.iter().enumerate() {
            writeln!(f)?;
            write!(f, "{row_idx:<index_width$}")?;
            for (cell, width) in row.iter().zip(&widths) {
                write!(f, "  {cell:>width$}")?;
            }
        }

        Ok(())
    }
}

/// Conversion into a row oriented tabular value.
///
/// Pure, the source is left untouched.
pub trait ToTabular {
    fn to_tabular(&self) -> Result<TabularValue>;
}

impl ToTabular for Table {
    fn to_tabular(&self) -> Result<TabularValue> {
        let mut rows = Vec::with_capacity(self.num_rows());
        for batch in self.batches() {
            append_batch_rows(batch, &mut rows)?;
        }
        Ok(TabularValue {
            columns: headers(self.schema()),
            rows,
        })
    }
}

impl ToTabular for RecordBatch {
    fn to_tabular(&self) -> Result<TabularValue> {
        let mut rows = Vec::with_capacity(self.num_rows());
        append_batch_rows(self, &mut rows)?;
        Ok(TabularValue {
            columns: headers(&self.schema()),
            rows,
        })
    }
}

pub fn to_tabular(value: &impl ToTabular) -> Result<TabularValue> {
    value.to_tabular()
}

fn headers(schema: &Schema) -> Vec<ColumnHeader> {
    schema
        .fields()
        .iter()
        .map(|f| ColumnHeader {
            name: f.name().clone(),
            datatype: f.data_type().clone(),
            nullable: f.is_nullable(),
        })
        .collect()
}

fn append_batch_rows(batch: &RecordBatch, rows: &mut Vec<Vec<CellValue>>) -> Result<()> {
    let columns = batch
        .columns()
        .iter()
        .map(column_cells)
        .collect::<Result<Vec<_>>>()?;

    let mut iters: Vec<_> = columns.into_iter().map(|c| c.into_iter()).collect();
    for _ in 0..batch.num_rows() {
        let row = iters
            .iter_mut()
            .map(|it| it.next().unwrap_or(CellValue::Null))
            .collect();
        rows.push(row);
    }

    Ok(())
}

fn column_cells(array: &ArrayRef) -> Result<Vec<CellValue>> {
    macro_rules! primitive_cells {
        ($ty:ty, $variant:ident, $conv:expr) => {{
            let arr = array.as_primitive::<$ty>();
            arr.iter()
                .map(|v| match v {
                    Some(v) => CellValue::$variant($conv(v)),
                    None => CellValue::Null,
                })
                .collect()
        }};
    }

    let cells = match array.data_type() {
        DataType::Null => vec![CellValue::Null; array.len()],
        DataType::Boolean => array
            .as_boolean()
            .iter()
            .map(|v| v.map(CellValue::Boolean).unwrap_or(CellValue::Null))
            .collect(),
        DataType::Int8 => primitive_cells!(Int8Type, Int, i64::from),
        DataType::Int16 => primitive_cells!(Int16Type, Int, i64::from),
        DataType::Int32 => primitive_cells!(Int32Type, Int, i64::from),
        DataType::Int64 => primitive_cells!(Int64Type, Int, |v: i64| v),
        DataType::UInt8 => primitive_cells!(UInt8Type, UInt, u64::from),
        DataType::UInt16 => primitive_cells!(UInt16Type, UInt, u64::from),
        DataType::UInt32 => primitive_cells!(UInt32Type, UInt, u64::from),
        DataType::UInt64 => primitive_cells!(UInt64Type, UInt, |v: u64| v),
        DataType::Float32 => primitive_cells!(Float32Type, Float32, |v: f32| v),
        DataType::Float64 => primitive_cells!(Float64Type, Float64, |v: f64| v),
        DataType::Utf8 => array
            .as_string::<i32>()
            .iter()
            .map(|v| match v {
                Some(s) => CellValue::Utf8(s.to_string()),
                None => CellValue::Null,
            })
            .collect(),
        DataType::LargeUtf8 => array
            .as_string::<i64>()
            .iter()
            .map(|v| match v {
                Some(s) => CellValue::Utf8(s.to_string()),
                None => CellValue::Null,
            })
            .collect(),
        _ => {
            let formatter = ArrayFormatter::try_new(array.as_ref(), &FORMAT_OPTIONS)?;
            let mut cells = Vec::with_capacity(array.len());
            for idx in 0..array.len() {
                if array.is_null(idx) {
                    cells.push(CellValue::Null);
                } else {
                    cells.push(CellValue::Formatted(formatter.value(idx).try_to_string()?));
                }
            }
            cells
        }
    };

    Ok(cells)
}
