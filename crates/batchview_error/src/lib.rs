use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error;
use std::fmt;
use std::io;

use arrow_schema::ArrowError;

pub type Result<T, E = BatchviewError> = std::result::Result<T, E>;

/// Coarse classification of an error.
///
/// Callers branch on the kind; the message is for humans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The requested resource does not exist.
    NotFound,
    /// Bytes did not match the expected IPC framing, or were truncated.
    Format,
    /// No batches were produced when at least one was required.
    EmptyStream,
    /// Some other I/O failure.
    Io,
    Other,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found"),
            Self::Format => write!(f, "format error"),
            Self::EmptyStream => write!(f, "empty stream"),
            Self::Io => write!(f, "io error"),
            Self::Other => write!(f, "error"),
        }
    }
}

#[derive(Debug)]
pub struct BatchviewError {
    inner: Box<BatchviewErrorInner>,
}

#[derive(Debug)]
struct BatchviewErrorInner {
    kind: ErrorKind,
    msg: String,
    source: Option<Box<dyn Error + Send + Sync>>,
    backtrace: Backtrace,
}

impl BatchviewError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Other, msg)
    }

    pub fn with_kind(kind: ErrorKind, msg: impl Into<String>) -> Self {
        BatchviewError {
            inner: Box::new(BatchviewErrorInner {
                kind,
                msg: msg.into(),
                source: None,
                backtrace: Backtrace::capture(),
            }),
        }
    }

    pub fn with_source(msg: impl Into<String>, source: Box<dyn Error + Send + Sync>) -> Self {
        let mut err = Self::new(msg);
        err.inner.source = Some(source);
        err
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::NotFound, msg)
    }

    pub fn format(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Format, msg)
    }

    pub fn empty_stream(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::EmptyStream, msg)
    }

    /// Override the kind, keeping message and source.
    pub fn kinded(mut self, kind: ErrorKind) -> Self {
        self.inner.kind = kind;
        self
    }

    /// Wrap this error under a new message, keeping the kind.
    pub fn wrap(self, msg: impl Into<String>) -> Self {
        let kind = self.kind();
        BatchviewError::with_source(msg, Box::new(self)).kinded(kind)
    }

    pub fn kind(&self) -> ErrorKind {
        self.inner.kind
    }

    pub fn get_backtrace(&self) -> Option<&Backtrace> {
        if self.inner.backtrace.status() == BacktraceStatus::Captured {
            Some(&self.inner.backtrace)
        } else {
            None
        }
    }
}

impl fmt::Display for BatchviewError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner.msg)?;
        if let Some(source) = &self.inner.source {
            write!(f, ": {source}")?;
        }
        Ok(())
    }
}

impl Error for BatchviewError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.inner.source.as_ref().map(|e| e.as_ref() as _)
    }
}

fn io_kind(err: &io::Error) -> ErrorKind {
    match err.kind() {
        io::ErrorKind::NotFound => ErrorKind::NotFound,
        io::ErrorKind::UnexpectedEof | io::ErrorKind::InvalidData => ErrorKind::Format,
        _ => ErrorKind::Io,
    }
}

impl From<io::Error> for BatchviewError {
    fn from(value: io::Error) -> Self {
        let kind = io_kind(&value);
        let msg = match value.kind() {
            io::ErrorKind::UnexpectedEof => "Unexpected end of input",
            io::ErrorKind::InvalidData => "Malformed input",
            _ => "IO error",
        };
        BatchviewError::with_source(msg, Box::new(value)).kinded(kind)
    }
}

impl From<ArrowError> for BatchviewError {
    fn from(value: ArrowError) -> Self {
        let kind = match &value {
            ArrowError::IoError(_, err) => io_kind(err),
            ArrowError::IpcError(_)
            | ArrowError::ParseError(_)
            | ArrowError::SchemaError(_)
            | ArrowError::InvalidArgumentError(_)
            | ArrowError::DictionaryKeyOverflowError
            | ArrowError::RunEndIndexOverflowError => ErrorKind::Format,
            _ => ErrorKind::Other,
        };
        BatchviewError::with_source("Arrow error", Box::new(value)).kinded(kind)
    }
}

impl From<fmt::Error> for BatchviewError {
    fn from(value: fmt::Error) -> Self {
        BatchviewError::with_source("Failed to write formatted output", Box::new(value))
    }
}

/// Attach a message to a foreign error while converting it.
pub trait ResultExt<T, E> {
    fn context(self, msg: &'static str) -> Result<T>;
    fn context_fn<F: Fn() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Error + Send + Sync + 'static> ResultExt<T, E> for std::result::Result<T, E> {
    fn context(self, msg: &'static str) -> Result<T> {
        self.map_err(|e| BatchviewError::with_source(msg, Box::new(e)))
    }

    fn context_fn<F: Fn() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| BatchviewError::with_source(f(), Box::new(e)))
    }
}
