//! Read Arrow IPC files and streams into in-memory tables.
//!
//! Decoding is done by `arrow-ipc`. This crate owns the pipeline around it:
//! opening a source, checking its leading bytes against the expected framing,
//! reading batches with fail-fast semantics, and turning the result into a
//! table or a row oriented tabular value.
pub mod format;
pub mod mode;
pub mod reader;
pub mod source;
pub mod table;
pub mod tabular;
pub mod testutil;
pub mod writer;

mod framing;
mod magic;

pub use mode::IpcMode;
pub use reader::{read_first_batch, read_table, IpcBatchReader, ReadOptions};
pub use source::IpcSource;
pub use table::Table;
pub use tabular::{to_tabular, CellValue, TabularValue, ToTabular};
