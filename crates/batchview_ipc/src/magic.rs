//! Leading byte checks run before handing a source to the arrow decoders.
//!
//! The decoders trust length prefixes, so garbage at the start of a stream or in
//! a file footer can turn into an enormous allocation or a seek before the
//! start. Checking lengths against the resource up front keeps that a format
//! error.
use std::io::{ErrorKind as IoErrorKind, Read, Seek, SeekFrom};

use batchview_error::{BatchviewError, Result};

use crate::mode::IpcMode;
use crate::source::SourceReader;

pub(crate) const ARROW_MAGIC: &[u8; 6] = b"ARROW1";

pub(crate) const CONTINUATION_MARKER: u32 = 0xFFFFFFFF;

/// Magic, padding to 8 bytes, footer length and trailing magic.
const MIN_FILE_LEN: u64 = 8 + 4 + ARROW_MAGIC.len() as u64;

/// Check the resource looks like `mode` without consuming anything.
pub(crate) fn check_leading_bytes(reader: &mut SourceReader, mode: IpcMode) -> Result<()> {
    match mode {
        IpcMode::File => check_file_magic(reader),
        IpcMode::Stream => check_stream_prefix(reader),
    }
}

fn check_file_magic(reader: &mut SourceReader) -> Result<()> {
    let len = reader.seek(SeekFrom::End(0))?;
    if len < MIN_FILE_LEN {
        return Err(BatchviewError::format(format!(
            "Resource too short to be an Arrow IPC file ({len} bytes)"
        )));
    }

    let mut magic = [0; 6];

    reader.seek(SeekFrom::Start(0))?;
    reader.read_exact(&mut magic)?;
    if &magic != ARROW_MAGIC {
        return Err(BatchviewError::format(format!(
            "Missing Arrow file magic at start of resource, got {magic:?}"
        )));
    }

    reader.seek(SeekFrom::End(-(ARROW_MAGIC.len() as i64)))?;
    reader.read_exact(&mut magic)?;
    if &magic != ARROW_MAGIC {
        return Err(BatchviewError::format(
            "Missing Arrow file magic at end of resource, file may be truncated",
        ));
    }

    check_file_footer(reader, len)?;

    reader.seek(SeekFrom::Start(0))?;
    Ok(())
}

/// Check the footer length and every block the footer points at lie inside
/// the resource.
fn check_file_footer(reader: &mut SourceReader, len: u64) -> Result<()> {
    let trailer_len = 4 + ARROW_MAGIC.len() as u64;

    let mut buf = [0; 4];
    reader.seek(SeekFrom::Start(len - trailer_len))?;
    reader.read_exact(&mut buf)?;

    let footer_len = i32::from_le_bytes(buf);
    let max_footer_len = len - MIN_FILE_LEN;
    if footer_len <= 0 || footer_len as u64 > max_footer_len {
        return Err(BatchviewError::format(format!(
            "Invalid footer length {footer_len}, file has room for at most {max_footer_len} bytes"
        )));
    }

    let data_end = len - trailer_len - footer_len as u64;
    let mut footer_buf = vec![0; footer_len as usize];
    reader.seek(SeekFrom::Start(data_end))?;
    reader.read_exact(&mut footer_buf)?;

    let footer = arrow_ipc::root_as_footer(&footer_buf)
        .map_err(|e| BatchviewError::format(format!("Unreadable file footer: {e}")))?;

    let blocks = footer
        .recordBatches()
        .into_iter()
        .chain(footer.dictionaries())
        .flat_map(|blocks| blocks.iter());

    for block in blocks {
        let offset = block.offset();
        let metadata_len = block.metaDataLength();
        let body_len = block.bodyLength();

        let block_end = if offset < 0 || metadata_len < 0 || body_len < 0 {
            None
        } else {
            (offset as u64)
                .checked_add(metadata_len as u64)
                .and_then(|end| end.checked_add(body_len as u64))
        };

        match block_end {
            Some(end) if end <= data_end => (),
            _ => {
                return Err(BatchviewError::format(format!(
                    "Footer block at offset {offset} (metadata {metadata_len}, body {body_len}) lies outside the {data_end} data bytes"
                )))
            }
        }
    }

    Ok(())
}

/// Validate the first encapsulated message prefix.
///
/// Accepts both the continuation marker form and the legacy form where the
/// metadata length comes first.
fn check_stream_prefix(reader: &mut SourceReader) -> Result<()> {
    let start = reader.stream_position()?;
    let remaining = reader.remaining_len()?;

    let mut buf = [0; 4];
    match reader.read_exact(&mut buf) {
        Ok(_) => (),
        Err(e) if e.kind() == IoErrorKind::UnexpectedEof => {
            return Err(BatchviewError::format(
                "Unexpected end of stream, expected a schema message",
            ))
        }
        Err(e) => return Err(e.into()),
    }

    let mut prefix_len = 4;
    if buf == CONTINUATION_MARKER.to_le_bytes() {
        match reader.read_exact(&mut buf) {
            Ok(_) => (),
            Err(e) if e.kind() == IoErrorKind::UnexpectedEof => {
                return Err(BatchviewError::format(
                    "Unexpected end of stream after continuation marker",
                ))
            }
            Err(e) => return Err(e.into()),
        }
        prefix_len += 4;
    }

    let metadata_size = i32::from_le_bytes(buf);
    if metadata_size == 0 {
        return Err(BatchviewError::format(
            "Stream ended before a schema message",
        ));
    }
    if metadata_size < 0 {
        return Err(BatchviewError::format(format!(
            "Unexpected bytes at beginning of stream, invalid metadata size {metadata_size}"
        )));
    }
    if metadata_size as u64 > remaining - prefix_len {
        return Err(BatchviewError::format(format!(
            "Schema message claims {metadata_size} bytes but only {} remain",
            remaining - prefix_len
        )));
    }

    reader.seek(SeekFrom::Start(start))?;
    Ok(())
}
