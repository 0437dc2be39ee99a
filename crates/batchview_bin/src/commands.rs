use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow_array::{ArrayRef, Int64Array, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema};
use batchview_error::{BatchviewError, Result, ResultExt};
use batchview_ipc::format::{describe_schema, render, TableFormat};
use batchview_ipc::writer::write_table;
use batchview_ipc::{IpcBatchReader, IpcMode, IpcSource, ReadOptions, Table};
use tracing::info;

#[derive(Debug, Clone)]
pub struct ShowOptions {
    pub path: PathBuf,
    pub mode: IpcMode,
    /// Memory map the file instead of reading it through a buffer.
    pub mmap: bool,
    pub first_only: bool,
    pub require_rows: bool,
    pub format: TableFormat,
    pub projection: Option<Vec<usize>>,
}

/// Read the input and print it.
///
/// Everything is rendered before anything is written, a failure part way
/// through prints nothing.
pub fn show(out: &mut impl Write, opts: ShowOptions) -> Result<()> {
    let read_opts = ReadOptions {
        projection: opts.projection,
    };
    let source = open_source(opts.path, opts.mmap);
    let mut reader = IpcBatchReader::open_with_options(source, opts.mode, read_opts)?;

    let table = if opts.first_only {
        match reader.read_next_batch()? {
            Some(batch) => Table::from_batch(batch),
            None if opts.require_rows => {
                return Err(BatchviewError::empty_stream(format!(
                    "Arrow IPC {} contained no record batches",
                    opts.mode
                )))
            }
            None => Table::empty(reader.schema().clone()),
        }
    } else if opts.require_rows {
        reader.read_all_non_empty()?
    } else {
        reader.read_all()?
    };
    reader.close();

    info!(
        batches = table.num_batches(),
        rows = table.num_rows(),
        "read table"
    );

    let rendered = render(&table, opts.format)?;
    writeln!(out, "{rendered}")?;

    Ok(())
}

pub fn schema(out: &mut impl Write, path: PathBuf, mode: IpcMode, mmap: bool) -> Result<()> {
    let reader = IpcBatchReader::open(open_source(path, mmap), mode)?;
    let described = describe_schema(reader.schema());
    reader.close();

    writeln!(out, "{described}")?;
    Ok(())
}

fn open_source(path: PathBuf, mmap: bool) -> IpcSource {
    if mmap {
        IpcSource::Mapped(path)
    } else {
        IpcSource::Path(path)
    }
}

/// Write an `id`, `name` table with `rows` rows split across `batches`
/// batches.
pub fn sample(
    out: &mut impl Write,
    path: &Path,
    mode: IpcMode,
    batches: usize,
    rows: usize,
) -> Result<()> {
    if batches == 0 {
        return Err(BatchviewError::new("Number of batches must be at least 1"));
    }

    let table = sample_table(batches, rows)?;
    write_table(path, &table, mode)?;

    writeln!(
        out,
        "Wrote {} rows in {} batches to {} ({mode})",
        table.num_rows(),
        table.num_batches(),
        path.display()
    )?;

    Ok(())
}

pub fn sample_table(batches: usize, rows: usize) -> Result<Table> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("name", DataType::Utf8, false),
    ]));

    // Spread rows evenly, the first `rows % batches` batches get one extra.
    let base = rows / batches;
    let extra = rows % batches;
    let mut out = Vec::with_capacity(batches);

    let mut start = 0;
    for batch_idx in 0..batches {
        let len = base + usize::from(batch_idx < extra);
        if len == 0 {
            break;
        }
        let end = start + len;
        let ids: Vec<i64> = (start..end).map(|i| i as i64 + 1).collect();
        let names: Vec<String> = (start..end).map(sample_name).collect();

        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(Int64Array::from(ids)) as ArrayRef,
                Arc::new(StringArray::from(names)) as ArrayRef,
            ],
        )
        .context("Failed to build sample batch")?;
        out.push(batch);

        start = end;
    }

    Table::try_new(schema, out)
}

/// `a`..`z`, then `aa`, `ab`, ...
fn sample_name(idx: usize) -> String {
    let mut name = Vec::new();
    let mut n = idx + 1;
    while n > 0 {
        n -= 1;
        name.push(b'a' + (n % 26) as u8);
        n /= 26;
    }
    name.reverse();
    String::from_utf8_lossy(&name).into_owned()
}

#[cfg(test)]
mod tests {
    use batchview_error::ErrorKind;

    use super::*;

    fn show_opts(path: PathBuf, mode: IpcMode) -> ShowOptions {
        ShowOptions {
            path,
            mode,
            mmap: false,
            first_only: false,
            require_rows: false,
            format: TableFormat::Tsv,
            projection: None,
        }
    }

    #[test]
    fn sample_names() {
        assert_eq!("a", sample_name(0));
        assert_eq!("z", sample_name(25));
        assert_eq!("aa", sample_name(26));
        assert_eq!("ab", sample_name(27));
    }

    #[test]
    fn sample_table_splits_batches() {
        let table = sample_table(3, 7).unwrap();
        assert_eq!(7, table.num_rows());
        assert_eq!(3, table.num_batches());
        let sizes: Vec<_> = table.batches().iter().map(|b| b.num_rows()).collect();
        assert_eq!(vec![3, 2, 2], sizes);
    }

    #[test]
    fn sample_table_honours_batch_count() {
        let table = sample_table(3, 4).unwrap();
        assert_eq!(4, table.num_rows());
        let sizes: Vec<_> = table.batches().iter().map(|b| b.num_rows()).collect();
        assert_eq!(vec![2, 1, 1], sizes);
    }

    #[test]
    fn sample_fewer_rows_than_batches() {
        let table = sample_table(5, 2).unwrap();
        let sizes: Vec<_> = table.batches().iter().map(|b| b.num_rows()).collect();
        assert_eq!(vec![1, 1], sizes);
    }

    #[test]
    fn sample_zero_rows() {
        let table = sample_table(2, 0).unwrap();
        assert_eq!(0, table.num_batches());
    }

    #[test]
    fn sample_then_show() {
        let dir = tempfile::tempdir().unwrap();

        for mode in [IpcMode::File, IpcMode::Stream] {
            let path = dir.path().join(format!("sample.{mode}.arrow"));
            let mut buf = Vec::new();
            sample(&mut buf, &path, mode, 1, 3).unwrap();

            let mut buf = Vec::new();
            show(&mut buf, show_opts(path, mode)).unwrap();
            assert_eq!("id\tname\n1\ta\n2\tb\n3\tc\n", String::from_utf8(buf).unwrap());
        }
    }

    #[test]
    fn show_first_batch_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("two.arrow");
        sample(&mut Vec::new(), &path, IpcMode::Stream, 2, 4).unwrap();

        let mut buf = Vec::new();
        let opts = ShowOptions {
            first_only: true,
            ..show_opts(path, IpcMode::Stream)
        };
        show(&mut buf, opts).unwrap();
        assert_eq!("id\tname\n1\ta\n2\tb\n", String::from_utf8(buf).unwrap());
    }

    #[test]
    fn show_projection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proj.arrow");
        sample(&mut Vec::new(), &path, IpcMode::File, 1, 2).unwrap();

        let mut buf = Vec::new();
        let opts = ShowOptions {
            projection: Some(vec![1]),
            ..show_opts(path, IpcMode::File)
        };
        show(&mut buf, opts).unwrap();
        assert_eq!("name\na\nb\n", String::from_utf8(buf).unwrap());
    }

    #[test]
    fn show_require_rows_on_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.arrow");
        sample(&mut Vec::new(), &path, IpcMode::Stream, 1, 0).unwrap();

        for first_only in [false, true] {
            let mut buf = Vec::new();
            let opts = ShowOptions {
                require_rows: true,
                first_only,
                ..show_opts(path.clone(), IpcMode::Stream)
            };
            let err = show(&mut buf, opts).unwrap_err();
            assert_eq!(ErrorKind::EmptyStream, err.kind());
            assert!(buf.is_empty());
        }
    }

    #[test]
    fn show_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut buf = Vec::new();
        let err = show(
            &mut buf,
            show_opts(dir.path().join("missing.arrow"), IpcMode::File),
        )
        .unwrap_err();
        assert_eq!(ErrorKind::NotFound, err.kind());
        assert!(buf.is_empty());
    }

    #[test]
    fn schema_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.arrow");
        sample(&mut Vec::new(), &path, IpcMode::File, 1, 1).unwrap();

        let mut buf = Vec::new();
        schema(&mut buf, path, IpcMode::File, false).unwrap();
        assert_eq!("id: Int64\nname: Utf8\n", String::from_utf8(buf).unwrap());
    }

    #[test]
    fn show_mapped() {
        let dir = tempfile::tempdir().unwrap();

        for mode in [IpcMode::File, IpcMode::Stream] {
            let path = dir.path().join(format!("mapped.{mode}.arrow"));
            sample(&mut Vec::new(), &path, mode, 2, 3).unwrap();

            let mut buf = Vec::new();
            let opts = ShowOptions {
                mmap: true,
                ..show_opts(path.clone(), mode)
            };
            show(&mut buf, opts).unwrap();
            assert_eq!("id\tname\n1\ta\n2\tb\n3\tc\n", String::from_utf8(buf).unwrap());

            let mut buf = Vec::new();
            schema(&mut buf, path, mode, true).unwrap();
            assert_eq!("id: Int64\nname: Utf8\n", String::from_utf8(buf).unwrap());
        }
    }

    #[test]
    fn show_mapped_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let opts = ShowOptions {
            mmap: true,
            ..show_opts(dir.path().join("missing.arrow"), IpcMode::Stream)
        };
        let err = show(&mut Vec::new(), opts).unwrap_err();
        assert_eq!(ErrorKind::NotFound, err.kind());
    }

    #[test]
    fn sample_requires_batches() {
        let dir = tempfile::tempdir().unwrap();
        sample(&mut Vec::new(), &dir.path().join("x.arrow"), IpcMode::File, 0, 3).unwrap_err();
    }
}
