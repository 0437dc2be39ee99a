use std::io::Seek;

use arrow_array::{RecordBatch, RecordBatchReader};
use arrow_ipc::reader::{FileReader, StreamReader};
use arrow_schema::SchemaRef;
use batchview_error::{BatchviewError, Result, ResultExt};
use tracing::{debug, trace, warn};

use crate::framing::{scan_stream_messages, CheckedStream};
use crate::magic::check_leading_bytes;
use crate::mode::IpcMode;
use crate::source::IpcSource;
use crate::table::Table;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadOptions {
    /// Indices of the columns to keep, in output order. `None` keeps every
    /// column.
    pub projection: Option<Vec<usize>>,
}

impl ReadOptions {
    pub fn with_projection(mut self, projection: impl IntoIterator<Item = usize>) -> Self {
        self.projection = Some(projection.into_iter().collect());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReaderState {
    Open,
    Exhausted,
    /// A read failed, nothing more will be produced.
    Poisoned,
}

/// Reads record batches out of an Arrow IPC file or stream.
///
/// The underlying resource is owned by the reader and released when the
/// reader is closed or dropped.
pub struct IpcBatchReader {
    inner: Box<dyn RecordBatchReader>,
    /// Schema of the batches we produce, after projection.
    schema: SchemaRef,
    projection: Option<Vec<usize>>,
    mode: IpcMode,
    state: ReaderState,
    batches_read: usize,
    rows_read: usize,
}

impl std::fmt::Debug for IpcBatchReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IpcBatchReader")
            .field("schema", &self.schema)
            .field("projection", &self.projection)
            .field("mode", &self.mode)
            .field("state", &self.state)
            .field("batches_read", &self.batches_read)
            .finish_non_exhaustive()
    }
}

impl IpcBatchReader {
    /// Open a source, reading everything needed to know the schema.
    ///
    /// Errors with a `NotFound` kind if the source path doesn't exist, and a
    /// `Format` kind if the leading bytes don't match `mode`.
    pub fn open(source: impl Into<IpcSource>, mode: IpcMode) -> Result<Self> {
        Self::open_with_options(source, mode, ReadOptions::default())
    }

    pub fn open_with_options(
        source: impl Into<IpcSource>,
        mode: IpcMode,
        opts: ReadOptions,
    ) -> Result<Self> {
        let source = source.into();
        debug!(%source, %mode, "opening ipc source");

        let mut reader = source.into_reader()?;
        check_leading_bytes(&mut reader, mode)?;

        let inner: Box<dyn RecordBatchReader> = match mode {
            IpcMode::File => Box::new(FileReader::try_new(reader, None).map_err(|e| {
                BatchviewError::from(e).wrap("Failed to read Arrow IPC file footer")
            })?),
            IpcMode::Stream => {
                let start = reader.stream_position()?;
                let fault = scan_stream_messages(&mut reader)?;
                let checked = CheckedStream::new(reader, start, fault);
                Box::new(StreamReader::try_new(checked, None).map_err(|e| {
                    BatchviewError::from(e).wrap("Failed to read Arrow IPC stream schema")
                })?)
            }
        };

        let schema = match &opts.projection {
            Some(indices) => {
                let full = inner.schema();
                if let Some(idx) = indices.iter().find(|&&idx| idx >= full.fields().len()) {
                    return Err(BatchviewError::new(format!(
                        "Column index {idx} out of range, schema has {} columns",
                        full.fields().len()
                    )));
                }
                let projected = full
                    .project(indices)
                    .context("Failed to project schema")?;
                SchemaRef::new(projected)
            }
            None => inner.schema(),
        };

        debug!(num_fields = schema.fields().len(), "opened ipc source");

        Ok(IpcBatchReader {
            inner,
            schema,
            projection: opts.projection,
            mode,
            state: ReaderState::Open,
            batches_read: 0,
            rows_read: 0,
        })
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    /// Number of batches returned so far.
    pub fn batches_read(&self) -> usize {
        self.batches_read
    }

    /// Read the next batch, returning `None` once the source is exhausted.
    ///
    /// After `None` or an error, every later call returns `None`.
    pub fn read_next_batch(&mut self) -> Result<Option<RecordBatch>> {
        match self.state {
            ReaderState::Open => (),
            ReaderState::Exhausted => return Ok(None),
            ReaderState::Poisoned => {
                warn!("read attempted on a reader that previously failed");
                return Ok(None);
            }
        }

        match self.try_next_inner() {
            Ok(Some(batch)) => {
                self.batches_read += 1;
                self.rows_read += batch.num_rows();
                trace!(
                    batch_idx = self.batches_read - 1,
                    num_rows = batch.num_rows(),
                    "read batch"
                );
                Ok(Some(batch))
            }
            Ok(None) => {
                debug!(
                    batches = self.batches_read,
                    rows = self.rows_read,
                    "ipc source exhausted"
                );
                self.state = ReaderState::Exhausted;
                Ok(None)
            }
            Err(e) => {
                self.state = ReaderState::Poisoned;
                Err(e)
            }
        }
    }

    fn try_next_inner(&mut self) -> Result<Option<RecordBatch>> {
        let batch = match self.inner.next() {
            Some(result) => result.map_err(|e| {
                BatchviewError::from(e).wrap(format!(
                    "Failed to decode record batch {}",
                    self.batches_read
                ))
            })?,
            None => return Ok(None),
        };

        let batch = match &self.projection {
            Some(indices) => batch.project(indices).context("Failed to project batch")?,
            None => batch,
        };

        if batch.schema().fields() != self.schema.fields() {
            return Err(BatchviewError::format(format!(
                "Batch {} schema does not match stream schema",
                self.batches_read
            )));
        }

        Ok(Some(batch))
    }

    /// Read all remaining batches into a table.
    ///
    /// A source with a schema but no batches produces an empty table.
    pub fn read_all(&mut self) -> Result<Table> {
        let mut batches = Vec::new();
        while let Some(batch) = self.read_next_batch()? {
            batches.push(batch);
        }
        Table::try_new(self.schema.clone(), batches)
    }

    /// Like `read_all`, but errors with an `EmptyStream` kind if no batches
    /// were read.
    pub fn read_all_non_empty(&mut self) -> Result<Table> {
        let table = self.read_all()?;
        if table.num_batches() == 0 {
            return Err(BatchviewError::empty_stream(format!(
                "Arrow IPC {} contained no record batches",
                self.mode
            )));
        }
        Ok(table)
    }

    /// Release the underlying resource.
    pub fn close(self) {
        debug!(
            mode = %self.mode,
            batches = self.batches_read,
            rows = self.rows_read,
            "closing ipc reader"
        );
    }
}

impl Iterator for IpcBatchReader {
    type Item = Result<RecordBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_next_batch().transpose()
    }
}

/// Open, read every batch, and close.
pub fn read_table(source: impl Into<IpcSource>, mode: IpcMode) -> Result<Table> {
    let mut reader = IpcBatchReader::open(source, mode)?;
    let table = reader.read_all()?;
    reader.close();
    Ok(table)
}

/// Open, read a single batch, and close.
///
/// `None` if the source has a schema but no batches.
pub fn read_first_batch(
    source: impl Into<IpcSource>,
    mode: IpcMode,
) -> Result<Option<RecordBatch>> {
    let mut reader = IpcBatchReader::open(source, mode)?;
    let batch = reader.read_next_batch()?;
    reader.close();
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use batchview_error::ErrorKind;

    use super::*;
    use crate::magic::CONTINUATION_MARKER;
    use crate::testutil::{id_name_batch, id_name_schema, ipc_bytes};

    #[test]
    fn single_batch_then_end_of_stream() {
        for mode in [IpcMode::File, IpcMode::Stream] {
            let bytes = ipc_bytes(mode, &[id_name_batch(&[1, 2, 3], &["a", "b", "c"])]);
            let mut reader = IpcBatchReader::open(bytes, mode).unwrap();

            let batch = reader.read_next_batch().unwrap().unwrap();
            assert_eq!(3, batch.num_rows());
            assert!(reader.read_next_batch().unwrap().is_none());
            // Stays exhausted.
            assert!(reader.read_next_batch().unwrap().is_none());
            assert_eq!(1, reader.batches_read());
        }
    }

    #[test]
    fn read_all_sums_rows() {
        for mode in [IpcMode::File, IpcMode::Stream] {
            let batches = [
                id_name_batch(&[1, 2], &["a", "b"]),
                id_name_batch(&[3], &["c"]),
                id_name_batch(&[4, 5, 6, 7], &["d", "e", "f", "g"]),
            ];
            let bytes = ipc_bytes(mode, &batches);
            let table = IpcBatchReader::open(bytes, mode).unwrap().read_all().unwrap();

            assert_eq!(7, table.num_rows());
            assert_eq!(3, table.num_batches());
            for batch in table.batches() {
                assert_eq!(table.schema(), &batch.schema());
            }
        }
    }

    #[test]
    fn schema_only_stream_reads_empty_table() {
        for mode in [IpcMode::File, IpcMode::Stream] {
            let bytes = ipc_bytes(mode, &[]);
            let mut reader = IpcBatchReader::open(bytes, mode).unwrap();
            assert_eq!(&id_name_schema(), reader.schema());

            let table = reader.read_all().unwrap();
            assert_eq!(0, table.num_rows());
            assert_eq!(2, table.num_columns());
        }
    }

    #[test]
    fn non_empty_required() {
        let bytes = ipc_bytes(IpcMode::Stream, &[]);
        let err = IpcBatchReader::open(bytes, IpcMode::Stream)
            .unwrap()
            .read_all_non_empty()
            .unwrap_err();
        assert_eq!(ErrorKind::EmptyStream, err.kind());
    }

    #[test]
    fn missing_path_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err =
            IpcBatchReader::open(dir.path().join("missing.arrow"), IpcMode::File).unwrap_err();
        assert_eq!(ErrorKind::NotFound, err.kind());
    }

    #[test]
    fn corrupted_leading_bytes() {
        for mode in [IpcMode::File, IpcMode::Stream] {
            let mut bytes = ipc_bytes(mode, &[id_name_batch(&[1], &["a"])]);
            bytes[0..4].copy_from_slice(b"JUNK");
            let err = IpcBatchReader::open(bytes, mode).unwrap_err();
            assert_eq!(ErrorKind::Format, err.kind(), "mode: {mode}");
        }
    }

    #[test]
    fn wrong_mode_is_format_error() {
        let stream = ipc_bytes(IpcMode::Stream, &[id_name_batch(&[1], &["a"])]);
        let err = IpcBatchReader::open(stream, IpcMode::File).unwrap_err();
        assert_eq!(ErrorKind::Format, err.kind());
    }

    #[test]
    fn truncated_stream_batch_poisons_reader() {
        let batches = [
            id_name_batch(&[1, 2], &["a", "b"]),
            id_name_batch(&[3, 4], &["c", "d"]),
        ];
        let mut bytes = ipc_bytes(IpcMode::Stream, &batches);
        // Drop the end of stream marker and part of the last batch body.
        bytes.truncate(bytes.len() - 16);

        let mut reader = IpcBatchReader::open(bytes, IpcMode::Stream).unwrap();
        assert!(reader.read_next_batch().unwrap().is_some());

        let err = reader.read_next_batch().unwrap_err();
        assert_eq!(ErrorKind::Format, err.kind());
        assert!(reader.read_next_batch().unwrap().is_none());
    }

    #[test]
    fn malformed_batch_prefix_after_schema() {
        let mut bytes = ipc_bytes(IpcMode::Stream, &[id_name_batch(&[1], &["a"])]);
        // Replace the end of stream marker with a negative metadata length.
        bytes.truncate(bytes.len() - 8);
        bytes.extend_from_slice(&CONTINUATION_MARKER.to_le_bytes());
        bytes.extend_from_slice(&(-2_i32).to_le_bytes());
        bytes.extend_from_slice(&[0; 16]);

        let mut reader = IpcBatchReader::open(bytes, IpcMode::Stream).unwrap();
        assert!(reader.read_next_batch().unwrap().is_some());

        let err = reader.read_next_batch().unwrap_err();
        assert_eq!(ErrorKind::Format, err.kind());
        assert!(reader.read_next_batch().unwrap().is_none());
    }

    #[test]
    fn oversized_batch_metadata_length() {
        let mut bytes = ipc_bytes(IpcMode::Stream, &[]);
        bytes.truncate(bytes.len() - 8);
        bytes.extend_from_slice(&CONTINUATION_MARKER.to_le_bytes());
        bytes.extend_from_slice(&i32::MAX.to_le_bytes());
        bytes.extend_from_slice(&[0; 8]);

        let mut reader = IpcBatchReader::open(bytes, IpcMode::Stream).unwrap();
        let err = reader.read_next_batch().unwrap_err();
        assert_eq!(ErrorKind::Format, err.kind());
    }

    #[test]
    fn file_footer_length_too_large() {
        let mut bytes = ipc_bytes(IpcMode::File, &[id_name_batch(&[1], &["a"])]);
        let n = bytes.len();
        bytes[n - 10..n - 6].copy_from_slice(&1_000_000_i32.to_le_bytes());

        let err = IpcBatchReader::open(bytes, IpcMode::File).unwrap_err();
        assert_eq!(ErrorKind::Format, err.kind());
    }

    #[test]
    fn stream_handle_not_at_start() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("offset.arrows");

        let mut bytes = b"skip me!".to_vec();
        bytes.extend(ipc_bytes(
            IpcMode::Stream,
            &[id_name_batch(&[1, 2], &["a", "b"])],
        ));
        std::fs::write(&path, bytes).unwrap();

        let mut file = std::fs::File::open(&path).unwrap();
        file.seek(std::io::SeekFrom::Start(8)).unwrap();

        let table = read_table(file, IpcMode::Stream).unwrap();
        assert_eq!(2, table.num_rows());
    }

    #[test]
    fn read_mapped_file() {
        let dir = tempfile::tempdir().unwrap();
        for mode in [IpcMode::File, IpcMode::Stream] {
            let path = dir.path().join(format!("mapped.{mode}"));
            let batches = [id_name_batch(&[1, 2], &["a", "b"]), id_name_batch(&[3], &["c"])];
            std::fs::write(&path, ipc_bytes(mode, &batches)).unwrap();

            let table = read_table(IpcSource::mapped(&path), mode).unwrap();
            assert_eq!(batches.to_vec(), table.batches());
        }
    }

    #[test]
    fn projection_applies_to_schema_and_batches() {
        let bytes = ipc_bytes(IpcMode::File, &[id_name_batch(&[1, 2], &["a", "b"])]);
        let opts = ReadOptions::default().with_projection([1]);
        let mut reader = IpcBatchReader::open_with_options(bytes, IpcMode::File, opts).unwrap();

        assert_eq!(1, reader.schema().fields().len());
        assert_eq!("name", reader.schema().field(0).name());

        let batch = reader.read_next_batch().unwrap().unwrap();
        assert_eq!(1, batch.num_columns());
    }

    #[test]
    fn projection_out_of_range() {
        let bytes = ipc_bytes(IpcMode::Stream, &[id_name_batch(&[1], &["a"])]);
        let opts = ReadOptions::default().with_projection([0, 5]);
        let err = IpcBatchReader::open_with_options(bytes, IpcMode::Stream, opts).unwrap_err();
        assert_eq!(ErrorKind::Other, err.kind());
    }

    #[test]
    fn iterator_yields_all_batches() {
        let batches = [id_name_batch(&[1], &["a"]), id_name_batch(&[2], &["b"])];
        let bytes = ipc_bytes(IpcMode::Stream, &batches);
        let reader = IpcBatchReader::open(bytes, IpcMode::Stream).unwrap();

        let got: Vec<_> = reader.collect::<Result<_>>().unwrap();
        assert_eq!(batches.to_vec(), got);
    }

    #[test]
    fn read_from_file_handle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("handle.arrow");
        std::fs::write(
            &path,
            ipc_bytes(IpcMode::File, &[id_name_batch(&[1, 2], &["a", "b"])]),
        )
        .unwrap();

        let file = std::fs::File::open(&path).unwrap();
        let table = read_table(file, IpcMode::File).unwrap();
        assert_eq!(2, table.num_rows());
    }

    #[test]
    fn first_batch_only() {
        let batches = [id_name_batch(&[1], &["a"]), id_name_batch(&[2, 3], &["b", "c"])];
        let bytes = ipc_bytes(IpcMode::Stream, &batches);
        let batch = read_first_batch(bytes, IpcMode::Stream).unwrap().unwrap();
        assert_eq!(batches[0], batch);
    }
}
