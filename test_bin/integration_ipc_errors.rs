use std::fs::{self, File};
use std::io::{Seek, SeekFrom};

use batchview_error::ErrorKind;
use batchview_ipc::{read_table, IpcBatchReader, IpcMode, IpcSource};
use test_bin::{mixed_batch, mixed_schema, scenario_batch, write_with_arrow};

#[test]
fn nonexistent_path() {
    let dir = tempfile::tempdir().unwrap();
    for mode in [IpcMode::File, IpcMode::Stream] {
        let err = IpcBatchReader::open(dir.path().join("nope.arrow"), mode).unwrap_err();
        assert_eq!(ErrorKind::NotFound, err.kind());
    }
}

#[test]
fn corrupted_leading_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let batch = scenario_batch();

    for mode in [IpcMode::File, IpcMode::Stream] {
        let path = dir.path().join(format!("corrupt.{mode}.arrow"));
        write_with_arrow(&path, mode, &batch.schema(), &[batch.clone()]);

        let mut bytes = fs::read(&path).unwrap();
        for b in bytes.iter_mut().take(8) {
            *b = 0x7F;
        }
        fs::write(&path, bytes).unwrap();

        let err = IpcBatchReader::open(&path, mode).unwrap_err();
        assert_eq!(ErrorKind::Format, err.kind(), "mode: {mode}");
    }
}

#[test]
fn truncated_file_footer() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("truncated.arrow");
    write_with_arrow(&path, IpcMode::File, &mixed_schema(), &[mixed_batch(0, 5)]);

    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..bytes.len() - 3]).unwrap();

    let err = read_table(path, IpcMode::File).unwrap_err();
    assert_eq!(ErrorKind::Format, err.kind());
}

#[test]
fn truncated_stream_body() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("truncated.stream");
    write_with_arrow(
        &path,
        IpcMode::Stream,
        &mixed_schema(),
        &[mixed_batch(0, 5), mixed_batch(5, 5)],
    );

    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..bytes.len() - 24]).unwrap();

    let err = read_table(path, IpcMode::Stream).unwrap_err();
    assert_eq!(ErrorKind::Format, err.kind());
}

#[test]
fn stream_opened_as_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stream.arrow");
    let batch = scenario_batch();
    write_with_arrow(&path, IpcMode::Stream, &batch.schema(), &[batch.clone()]);

    let err = IpcBatchReader::open(&path, IpcMode::File).unwrap_err();
    assert_eq!(ErrorKind::Format, err.kind());
}

#[test]
fn empty_stream_required() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.arrow");
    write_with_arrow(&path, IpcMode::File, &mixed_schema(), &[]);

    let err = IpcBatchReader::open(&path, IpcMode::File)
        .unwrap()
        .read_all_non_empty()
        .unwrap_err();
    assert_eq!(ErrorKind::EmptyStream, err.kind());
}

#[test]
fn zero_byte_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("zero.arrow");
    fs::write(&path, b"").unwrap();

    for mode in [IpcMode::File, IpcMode::Stream] {
        let err = IpcBatchReader::open(&path, mode).unwrap_err();
        assert_eq!(ErrorKind::Format, err.kind());
    }
}

#[test]
fn malformed_message_after_first_batch() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("malformed.stream");
    let batch = scenario_batch();
    write_with_arrow(&path, IpcMode::Stream, &batch.schema(), &[batch.clone()]);

    // Swap the end of stream marker for a message with a negative length.
    let mut bytes = fs::read(&path).unwrap();
    bytes.truncate(bytes.len() - 8);
    bytes.extend_from_slice(&0xFFFFFFFF_u32.to_le_bytes());
    bytes.extend_from_slice(&(-2_i32).to_le_bytes());
    bytes.extend_from_slice(&[0; 16]);
    fs::write(&path, bytes).unwrap();

    for source in [IpcSource::path(&path), IpcSource::mapped(&path)] {
        let mut reader = IpcBatchReader::open(source, IpcMode::Stream).unwrap();
        assert_eq!(Some(batch.clone()), reader.read_next_batch().unwrap());

        let err = reader.read_next_batch().unwrap_err();
        assert_eq!(ErrorKind::Format, err.kind());
        assert_eq!(None, reader.read_next_batch().unwrap());
    }

    let err = read_table(&path, IpcMode::Stream).unwrap_err();
    assert_eq!(ErrorKind::Format, err.kind());
}

#[test]
fn oversized_footer_length() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("footer.arrow");
    write_with_arrow(&path, IpcMode::File, &mixed_schema(), &[mixed_batch(0, 5)]);

    let mut bytes = fs::read(&path).unwrap();
    let n = bytes.len();
    bytes[n - 10..n - 6].copy_from_slice(&1_000_000_i32.to_le_bytes());
    fs::write(&path, bytes).unwrap();

    for source in [IpcSource::path(&path), IpcSource::mapped(&path)] {
        let err = IpcBatchReader::open(source, IpcMode::File).unwrap_err();
        assert_eq!(ErrorKind::Format, err.kind());
    }
}

#[test]
fn stream_handle_past_leading_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let stream_path = dir.path().join("plain.stream");
    let batch = scenario_batch();
    write_with_arrow(&stream_path, IpcMode::Stream, &batch.schema(), &[batch.clone()]);

    let path = dir.path().join("prefixed.stream");
    let mut bytes = b"header:".to_vec();
    bytes.extend(fs::read(&stream_path).unwrap());
    fs::write(&path, bytes).unwrap();

    let mut file = File::open(&path).unwrap();
    file.seek(SeekFrom::Start(7)).unwrap();
    let table = read_table(file, IpcMode::Stream).unwrap();
    assert_eq!(vec![batch], table.batches());

    // From the start the prefix is garbage.
    let err = read_table(File::open(&path).unwrap(), IpcMode::Stream).unwrap_err();
    assert_eq!(ErrorKind::Format, err.kind());
}

#[test]
fn zero_byte_file_mapped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("zero.arrow");
    fs::write(&path, b"").unwrap();

    for mode in [IpcMode::File, IpcMode::Stream] {
        let err = IpcBatchReader::open(IpcSource::mapped(&path), mode).unwrap_err();
        assert_eq!(ErrorKind::Format, err.kind());
    }
}
