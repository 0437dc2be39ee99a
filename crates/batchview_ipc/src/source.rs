use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use batchview_error::{BatchviewError, ErrorKind, Result};
use memmap2::Mmap;

/// Something we can read IPC bytes from.
#[derive(Debug)]
pub enum IpcSource {
    /// A path on the local filesystem, opened on `IpcBatchReader::open`.
    Path(PathBuf),
    /// An already opened file handle. Stream mode reads from the handle's
    /// current position, file mode addresses the whole file.
    Handle(File),
    /// A path on the local filesystem, memory mapped on open instead of read
    /// through a buffer.
    Mapped(PathBuf),
    /// IPC bytes already in memory.
    Bytes(Vec<u8>),
}

impl IpcSource {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        IpcSource::Path(path.into())
    }

    pub fn mapped(path: impl Into<PathBuf>) -> Self {
        IpcSource::Mapped(path.into())
    }

    /// Open the underlying resource.
    ///
    /// Nothing past the open itself happens here, a missing path errors before
    /// any bytes are read.
    pub(crate) fn into_reader(self) -> Result<SourceReader> {
        match self {
            Self::Path(path) => {
                let file = open_file(&path)?;
                Ok(SourceReader::File(BufReader::new(file)))
            }
            Self::Handle(file) => Ok(SourceReader::File(BufReader::new(file))),
            Self::Mapped(path) => {
                let file = open_file(&path)?;
                let len = file
                    .metadata()
                    .map_err(|e| {
                        BatchviewError::with_source(
                            format!("Failed to stat '{}'", path.display()),
                            Box::new(e),
                        )
                        .kinded(ErrorKind::Io)
                    })?
                    .len();
                if len == 0 {
                    // Zero length mappings are rejected on some platforms.
                    return Ok(SourceReader::Memory(Cursor::new(Vec::new())));
                }

                // SAFETY: The map is read only. Truncating the file while it's
                // mapped is undefined, same as any other reader of a mapped
                // file.
                let mmap = unsafe { Mmap::map(&file) }.map_err(|e| {
                    BatchviewError::with_source(
                        format!("Failed to memory map '{}'", path.display()),
                        Box::new(e),
                    )
                    .kinded(ErrorKind::Io)
                })?;
                Ok(SourceReader::Mapped(Cursor::new(mmap)))
            }
            Self::Bytes(bytes) => Ok(SourceReader::Memory(Cursor::new(bytes))),
        }
    }
}

fn open_file(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => {
            BatchviewError::not_found(format!("'{}' does not exist", path.display()))
        }
        _ => BatchviewError::with_source(
            format!("Failed to open '{}'", path.display()),
            Box::new(e),
        )
        .kinded(ErrorKind::Io),
    })
}

impl fmt::Display for IpcSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => write!(f, "{}", path.display()),
            Self::Handle(_) => write!(f, "<file handle>"),
            Self::Mapped(path) => write!(f, "{} (mapped)", path.display()),
            Self::Bytes(bytes) => write!(f, "<{} bytes in memory>", bytes.len()),
        }
    }
}

impl From<PathBuf> for IpcSource {
    fn from(value: PathBuf) -> Self {
        IpcSource::Path(value)
    }
}

impl From<&Path> for IpcSource {
    fn from(value: &Path) -> Self {
        IpcSource::Path(value.to_path_buf())
    }
}

impl From<&PathBuf> for IpcSource {
    fn from(value: &PathBuf) -> Self {
        IpcSource::Path(value.clone())
    }
}

impl From<&str> for IpcSource {
    fn from(value: &str) -> Self {
        IpcSource::Path(value.into())
    }
}

impl From<File> for IpcSource {
    fn from(value: File) -> Self {
        IpcSource::Handle(value)
    }
}

impl From<Vec<u8>> for IpcSource {
    fn from(value: Vec<u8>) -> Self {
        IpcSource::Bytes(value)
    }
}

/// Opened source handed to the arrow decoders.
///
/// Every variant is seekable since file mode reads the footer first.
#[derive(Debug)]
pub(crate) enum SourceReader {
    File(BufReader<File>),
    Mapped(Cursor<Mmap>),
    Memory(Cursor<Vec<u8>>),
}

impl SourceReader {
    /// Bytes between the current position and the end of the resource.
    ///
    /// Leaves the position untouched.
    pub(crate) fn remaining_len(&mut self) -> io::Result<u64> {
        let pos = self.stream_position()?;
        let end = self.seek(SeekFrom::End(0))?;
        self.seek(SeekFrom::Start(pos))?;
        Ok(end.saturating_sub(pos))
    }
}

impl Read for SourceReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::File(r) => r.read(buf),
            Self::Mapped(r) => r.read(buf),
            Self::Memory(r) => r.read(buf),
        }
    }
}

impl Seek for SourceReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            Self::File(r) => r.seek(pos),
            Self::Mapped(r) => r.seek(pos),
            Self::Memory(r) => r.seek(pos),
        }
    }
}
