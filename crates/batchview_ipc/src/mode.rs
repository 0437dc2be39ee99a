use std::fmt;
use std::str::FromStr;

use batchview_error::{BatchviewError, Result};

/// Which IPC framing a resource uses.
///
/// There is no auto-detection, callers say what they expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpcMode {
    /// Random access container, `ARROW1` magic at both ends with a footer.
    File,
    /// Sequential framing, schema message followed by batch messages.
    Stream,
}

impl IpcMode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Stream => "stream",
        }
    }
}

impl fmt::Display for IpcMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for IpcMode {
    type Err = BatchviewError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "file" => Ok(Self::File),
            "stream" => Ok(Self::Stream),
            other => Err(BatchviewError::new(format!(
                "Invalid IPC mode '{other}', expected 'file' or 'stream'"
            ))),
        }
    }
}
