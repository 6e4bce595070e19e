//! Circular Event Log
//!
//! Fixed-capacity log of fixed-size binary records in one file. Appends
//! update the header and a single slot in place, so the file is never
//! rewritten or grown after creation.

mod record;
mod store;

pub use record::{LogRecord, RECORD_SIZE};
pub use store::{EventLog, LogReader, DEFAULT_CAPACITY, HEADER_SIZE};

use thiserror::Error;

/// Event log errors
#[derive(Debug, Error)]
pub enum LogError {
    /// Header points outside the record area
    #[error("Log header index {index} outside capacity {capacity}")]
    CorruptHeader { index: u32, capacity: u32 },

    /// Capacity of zero records requested
    #[error("Log capacity must be at least one record")]
    InvalidCapacity,

    /// Backing file could not be read or written
    #[error("Log file I/O error: {0}")]
    Io(#[from] std::io::Error),
}
