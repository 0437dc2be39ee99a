use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use arrow_array::RecordBatch;
use arrow_ipc::writer::{FileWriter, StreamWriter};
use arrow_schema::SchemaRef;
use batchview_error::{BatchviewError, Result, ResultExt};
use tracing::debug;

use crate::mode::IpcMode;
use crate::table::Table;

enum Inner<W: Write> {
    File(FileWriter<W>),
    Stream(StreamWriter<W>),
}

/// Writes batches using either IPC framing.
///
/// `finish` must be called to write the footer (file) or end of stream
/// marker (stream).
pub struct IpcTableWriter<W: Write> {
    inner: Inner<W>,
    schema: SchemaRef,
    batches_written: usize,
}

impl<W: Write> std::fmt::Debug for IpcTableWriter<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IpcTableWriter")
            .field("schema", &self.schema)
            .field("batches_written", &self.batches_written)
            .finish_non_exhaustive()
    }
}

impl<W: Write> IpcTableWriter<W> {
    pub fn try_new(sink: W, schema: SchemaRef, mode: IpcMode) -> Result<Self> {
        let inner = match mode {
            IpcMode::File => Inner::File(FileWriter::try_new(sink, &schema)?),
            IpcMode::Stream => Inner::Stream(StreamWriter::try_new(sink, &schema)?),
        };

        Ok(IpcTableWriter {
            inner,
            schema,
            batches_written: 0,
        })
    }

    pub fn write_batch(&mut self, batch: &RecordBatch) -> Result<()> {
        if batch.schema().fields() != self.schema.fields() {
            return Err(BatchviewError::new(
                "Cannot write batch with a schema differing from the writer schema",
            ));
        }

        match &mut self.inner {
            Inner::File(w) => w.write(batch)?,
            Inner::Stream(w) => w.write(batch)?,
        }
        self.batches_written += 1;

        Ok(())
    }

    /// Finish writing, returning the sink.
    pub fn finish(self) -> Result<W> {
        let sink = match self.inner {
            Inner::File(mut w) => {
                w.finish()?;
                w.into_inner()?
            }
            Inner::Stream(mut w) => {
                w.finish()?;
                w.into_inner()?
            }
        };
        Ok(sink)
    }
}

/// Encode a table into an in-memory buffer.
pub fn table_to_bytes(table: &Table, mode: IpcMode) -> Result<Vec<u8>> {
    let mut writer = IpcTableWriter::try_new(Vec::new(), table.schema().clone(), mode)?;
    for batch in table.batches() {
        writer.write_batch(batch)?;
    }
    writer.finish()
}

/// Write a table to `path`, replacing anything already there.
pub fn write_table(path: impl AsRef<Path>, table: &Table, mode: IpcMode) -> Result<()> {
    let path = path.as_ref();
    let file =
        File::create(path).context_fn(|| format!("Failed to create '{}'", path.display()))?;

    let mut writer =
        IpcTableWriter::try_new(BufWriter::new(file), table.schema().clone(), mode)?;
    for batch in table.batches() {
        writer.write_batch(batch)?;
    }

    let mut sink = writer.finish()?;
    sink.flush()?;

    debug!(
        path = %path.display(),
        %mode,
        batches = table.num_batches(),
        rows = table.num_rows(),
        "wrote ipc table"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::magic::ARROW_MAGIC;
    use crate::reader::read_table;
    use crate::testutil::{id_name_batch, id_name_schema};

    #[test]
    fn file_bytes_have_magic() {
        let table = Table::from_batch(id_name_batch(&[1], &["a"]));
        let bytes = table_to_bytes(&table, IpcMode::File).unwrap();

        assert_eq!(ARROW_MAGIC, &bytes[0..6]);
        assert_eq!(ARROW_MAGIC, &bytes[bytes.len() - 6..]);
    }

    #[test]
    fn stream_bytes_end_with_eos_marker() {
        let table = Table::from_batch(id_name_batch(&[1], &["a"]));
        let bytes = table_to_bytes(&table, IpcMode::Stream).unwrap();

        assert_eq!(
            &[0xFF_u8, 0xFF, 0xFF, 0xFF, 0, 0, 0, 0],
            &bytes[bytes.len() - 8..]
        );
    }

    #[test]
    fn reject_foreign_batch() {
        let schema = std::sync::Arc::new(id_name_schema().project(&[0]).unwrap());
        let mut writer = IpcTableWriter::try_new(Vec::new(), schema, IpcMode::Stream).unwrap();
        writer.write_batch(&id_name_batch(&[1], &["a"])).unwrap_err();
    }

    #[test]
    fn write_then_read_path() {
        let dir = tempfile::tempdir().unwrap();
        let table = Table::try_new(
            id_name_schema(),
            vec![
                id_name_batch(&[1, 2], &["a", "b"]),
                id_name_batch(&[3], &["c"]),
            ],
        )
        .unwrap();

        for mode in [IpcMode::File, IpcMode::Stream] {
            let path = dir.path().join(format!("table.{mode}.arrow"));
            write_table(&path, &table, mode).unwrap();

            let got = read_table(path, mode).unwrap();
            assert_eq!(table, got);
        }
    }
}
