//! Message framing checks for the stream format.
//!
//! The arrow stream decoder allocates whatever a message prefix asks for. Every
//! message prefix and body length is walked once up front, and the decoder
//! only ever sees bytes before the first bad message.
use std::io::{self, Read, Seek, SeekFrom};

use batchview_error::Result;
use tracing::debug;

use crate::magic::CONTINUATION_MARKER;
use crate::source::SourceReader;

/// First message whose framing can't be trusted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FramingFault {
    /// Absolute position of the message prefix.
    pub offset: u64,
    pub reason: String,
}

enum Step {
    Next(u64),
    End,
    Fault(String),
}

/// Walk every message from the current position, returning the first one with
/// bad framing.
///
/// The reader is left at the position it started at.
pub(crate) fn scan_stream_messages(reader: &mut SourceReader) -> Result<Option<FramingFault>> {
    let start = reader.stream_position()?;
    let end = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(start))?;

    let mut pos = start;
    let mut messages = 0;
    let fault = loop {
        match next_message(reader, pos, end)? {
            Step::Next(next) => {
                messages += 1;
                pos = next;
            }
            Step::End => break None,
            Step::Fault(reason) => break Some(FramingFault { offset: pos, reason }),
        }
    };

    reader.seek(SeekFrom::Start(start))?;

    match &fault {
        Some(fault) => debug!(
            offset = fault.offset,
            reason = %fault.reason,
            messages,
            "stream framing fault"
        ),
        None => debug!(messages, "stream framing ok"),
    }

    Ok(fault)
}

fn next_message(reader: &mut SourceReader, pos: u64, end: u64) -> Result<Step> {
    let remaining = end - pos;
    if remaining == 0 {
        return Ok(Step::End);
    }
    if remaining < 4 {
        return Ok(Step::Fault(format!(
            "{remaining} trailing bytes, too short for a message prefix"
        )));
    }

    let mut buf = [0; 4];
    reader.read_exact(&mut buf)?;

    let mut prefix_len = 4;
    if buf == CONTINUATION_MARKER.to_le_bytes() {
        if remaining < 8 {
            return Ok(Step::Fault(
                "continuation marker without a metadata length".to_string(),
            ));
        }
        reader.read_exact(&mut buf)?;
        prefix_len = 8;
    }

    let metadata_len = i32::from_le_bytes(buf);
    if metadata_len == 0 {
        // End of stream marker.
        return Ok(Step::End);
    }
    if metadata_len < 0 {
        return Ok(Step::Fault(format!(
            "invalid metadata length {metadata_len}"
        )));
    }
    let metadata_len = metadata_len as u64;
    let after_prefix = remaining - prefix_len;
    if metadata_len > after_prefix {
        return Ok(Step::Fault(format!(
            "metadata length {metadata_len} exceeds the {after_prefix} remaining bytes"
        )));
    }

    let mut metadata = vec![0; metadata_len as usize];
    reader.read_exact(&mut metadata)?;

    let message = match arrow_ipc::root_as_message(&metadata) {
        Ok(message) => message,
        Err(e) => return Ok(Step::Fault(format!("unreadable message header: {e}"))),
    };

    let body_len = message.bodyLength();
    let after_metadata = after_prefix - metadata_len;
    if body_len < 0 || body_len as u64 > after_metadata {
        return Ok(Step::Fault(format!(
            "body length {body_len} exceeds the {after_metadata} remaining bytes"
        )));
    }

    let next = pos + prefix_len + metadata_len + body_len as u64;
    reader.seek(SeekFrom::Start(next))?;

    Ok(Step::Next(next))
}

/// Passes bytes through until the first faulty message, then errors with
/// `InvalidData` instead of handing the bad prefix on.
#[derive(Debug)]
pub(crate) struct CheckedStream<R> {
    inner: R,
    pos: u64,
    fault: Option<FramingFault>,
}

impl<R> CheckedStream<R> {
    /// `pos` is the absolute position `inner` currently reads from.
    pub(crate) fn new(inner: R, pos: u64, fault: Option<FramingFault>) -> Self {
        CheckedStream { inner, pos, fault }
    }
}

impl<R: Read> Read for CheckedStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let fault = match &self.fault {
            Some(fault) => fault,
            None => {
                let n = self.inner.read(buf)?;
                self.pos += n as u64;
                return Ok(n);
            }
        };

        if buf.is_empty() {
            return Ok(0);
        }
        if self.pos >= fault.offset {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("malformed message at offset {}: {}", fault.offset, fault.reason),
            ));
        }

        let allowed = usize::try_from(fault.offset - self.pos).unwrap_or(usize::MAX);
        let max = allowed.min(buf.len());
        let n = self.inner.read(&mut buf[..max])?;
        self.pos += n as u64;
        Ok(n)
    }
}
