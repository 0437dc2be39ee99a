use std::fmt::{self, Write as _};
use std::str::FromStr;

use arrow_array::RecordBatch;
use arrow_cast::pretty::pretty_format_batches;
use arrow_schema::Schema;
use batchview_error::{BatchviewError, Result};

use crate::table::Table;
use crate::tabular::{CellValue, ToTabular};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TableFormat {
    /// Boxed table.
    #[default]
    Pretty,
    /// Dataframe style with a row index.
    Frame,
    /// Tab separated, header line first. Control characters are escaped.
    Tsv,
}

impl TableFormat {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pretty => "pretty",
            Self::Frame => "frame",
            Self::Tsv => "tsv",
        }
    }
}

impl fmt::Display for TableFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TableFormat {
    type Err = BatchviewError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "frame" => Ok(Self::Frame),
            "tsv" => Ok(Self::Tsv),
            other => Err(BatchviewError::new(format!(
                "Invalid table format '{other}'"
            ))),
        }
    }
}

pub fn render(table: &Table, format: TableFormat) -> Result<String> {
    match format {
        TableFormat::Pretty => render_pretty(table),
        TableFormat::Frame => Ok(table.to_tabular()?.to_string()),
        TableFormat::Tsv => render_tsv(table),
    }
}

fn render_pretty(table: &Table) -> Result<String> {
    // An empty slice renders nothing at all, keep the header.
    if table.num_batches() == 0 {
        let empty = RecordBatch::new_empty(table.schema().clone());
        return Ok(pretty_format_batches(&[empty])?.to_string());
    }
    Ok(pretty_format_batches(table.batches())?.to_string())
}

/// Backslash escapes tabs, newlines and backslashes, nulls print as `\N`.
fn render_tsv(table: &Table) -> Result<String> {
    let tabular = table.to_tabular()?;

    let mut buf = tabular
        .column_names()
        .map(escape_tsv)
        .collect::<Vec<_>>()
        .join("\t");
    for row in &tabular.rows {
        buf.push('\n');
        let line = row
            .iter()
            .map(|cell| match cell {
                CellValue::Null => "\\N".to_string(),
                cell => escape_tsv(&cell.to_string()),
            })
            .collect::<Vec<_>>()
            .join("\t");
        buf.push_str(&line);
    }

    Ok(buf)
}

fn escape_tsv(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}

/// One line per field, `name: type`, with nullable fields marked.
pub fn describe_schema(schema: &Schema) -> String {
    let mut buf = String::new();
    for (idx, field) in schema.fields().iter().enumerate() {
        if idx > 0 {
            buf.push('\n');
        }
        // Writing to a string can't fail.
        let _ = write!(buf, "{}: {}", field.name(), field.data_type());
        if field.is_nullable() {
            buf.push_str(" (nullable)");
        }
    }
    buf
}
