//! Event Log File Store

use crate::record::{LogRecord, RECORD_SIZE};
use crate::LogError;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default number of record slots
pub const DEFAULT_CAPACITY: u32 = 100;

/// Size of the next-write index at the start of the file
pub const HEADER_SIZE: u64 = 4;

/// Byte offset of a record slot
fn slot_offset(slot: u32) -> u64 {
    HEADER_SIZE + u64::from(slot) * RECORD_SIZE as u64
}

/// Circular log of fixed-size records.
///
/// File layout: `[u32 next_index LE][record 0]..[record capacity-1]`. The
/// header names the slot the next append will overwrite, which is also
/// the oldest record once the log has wrapped.
///
/// Only one foreground owner may append; concurrent callers need external
/// locking.
pub struct EventLog {
    /// Backing file
    path: PathBuf,
    /// Number of record slots
    capacity: u32,
    /// Open handle for sequential reads
    reader: Option<LogReader>,
}

impl EventLog {
    /// Create a log with the default capacity
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            capacity: DEFAULT_CAPACITY,
            reader: None,
        }
    }

    /// Create a log with the given number of slots
    pub fn with_capacity(path: impl Into<PathBuf>, capacity: u32) -> Result<Self, LogError> {
        if capacity == 0 {
            return Err(LogError::InvalidCapacity);
        }
        Ok(Self {
            path: path.into(),
            capacity,
            reader: None,
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of record slots
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Size of a fully initialised log file
    pub fn file_size(&self) -> u64 {
        slot_offset(self.capacity)
    }

    /// Append a record, overwriting the oldest slot once the log is full.
    ///
    /// The first append creates and pre-allocates the whole file. Later
    /// appends write one slot and the header in place. The slot is written
    /// before the header, so an interrupted append never advances the
    /// header past a slot that still holds an older record.
    pub fn append(&mut self, record: &LogRecord) -> Result<(), LogError> {
        let mut file = match OpenOptions::new().read(true).write(true).open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return self.create(record),
            Err(e) => {
                warn!("Failed to open log file {}: {}", self.path.display(), e);
                return Err(e.into());
            }
        };

        let mut header = [0u8; HEADER_SIZE as usize];
        match file.read_exact(&mut header) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                warn!("Log file {} has no header, re-creating", self.path.display());
                drop(file);
                return self.create(record);
            }
            Err(e) => return Err(e.into()),
        }

        let mut current = u32::from_le_bytes(header);
        if current >= self.capacity {
            warn!(
                "Log header {} outside capacity {}, wrapping",
                current, self.capacity
            );
            current %= self.capacity;
        }
        let next = (current + 1) % self.capacity;

        file.seek(SeekFrom::Start(slot_offset(current)))?;
        file.write_all(&record.encode())?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&next.to_le_bytes())?;
        file.flush()?;

        metrics::counter!("event_log_appends_total").increment(1);
        debug!("Log record written to slot {}, next {}", current, next);
        Ok(())
    }

    /// Create the file: header, the record in slot 0, placeholders after
    fn create(&self, record: &LogRecord) -> Result<(), LogError> {
        info!(
            "Creating log file {} with {} slots",
            self.path.display(),
            self.capacity
        );
        let file = File::create(&self.path).map_err(|e| {
            warn!("Failed to create log file {}: {}", self.path.display(), e);
            e
        })?;

        let mut writer = BufWriter::new(file);
        let next = 1 % self.capacity;
        writer.write_all(&next.to_le_bytes())?;
        writer.write_all(&record.encode())?;
        let placeholder = LogRecord::PLACEHOLDER.encode();
        for _ in 1..self.capacity {
            writer.write_all(&placeholder)?;
        }
        writer.flush()?;

        metrics::counter!("event_log_appends_total").increment(1);
        Ok(())
    }

    /// Read the next-write index from the header without validating it
    pub fn next_index(&self) -> Result<u32, LogError> {
        let mut file = File::open(&self.path)?;
        let mut header = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header)?;
        Ok(u32::from_le_bytes(header))
    }

    /// Open a reader over all slots in storage order
    pub fn records(&self) -> Result<LogReader, LogError> {
        LogReader::open(&self.path, self.capacity)
    }

    /// Begin sequential reading.
    ///
    /// Fails without reading any record when the file cannot be opened or
    /// the header is outside the capacity. Records come back in slot order
    /// (slot 0 first), not oldest first; use [`EventLog::chronological`]
    /// for time order.
    pub fn iterate_start(&mut self) -> Result<(), LogError> {
        self.reader = None;
        let reader = self.records().map_err(|e| {
            warn!("Cannot read log {}: {}", self.path.display(), e);
            e
        })?;
        self.reader = Some(reader);
        Ok(())
    }

    /// Next record in slot order, `None` at end of data or when not started
    pub fn iterate_next(&mut self) -> Option<LogRecord> {
        self.reader.as_mut()?.next()
    }

    /// Release the read handle; false when none was open
    pub fn iterate_end(&mut self) -> bool {
        self.reader.take().is_some()
    }

    /// Written records from oldest to newest.
    ///
    /// Starts at the header slot, wraps around and skips placeholders.
    pub fn chronological(&self) -> Result<Vec<LogRecord>, LogError> {
        let reader = self.records()?;
        let start = reader.next_index() as usize;
        let mut records: Vec<LogRecord> = reader.take(self.capacity as usize).collect();
        let start = start.min(records.len());
        records.rotate_left(start);
        records.retain(|record| !record.is_placeholder());
        Ok(records)
    }

    /// Delete the log file; the next append re-creates it
    pub fn reset(&mut self) -> Result<(), LogError> {
        self.reader = None;
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!("Removed log file {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Log file already absent");
                Ok(())
            }
            Err(e) => {
                warn!("Failed to remove log file {}: {}", self.path.display(), e);
                Err(e.into())
            }
        }
    }
}

/// Sequential reader over log slots in storage order
pub struct LogReader {
    inner: BufReader<File>,
    next_index: u32,
}

impl LogReader {
    fn open(path: &Path, capacity: u32) -> Result<Self, LogError> {
        let mut inner = BufReader::new(File::open(path)?);
        let mut header = [0u8; HEADER_SIZE as usize];
        inner.read_exact(&mut header)?;

        let next_index = u32::from_le_bytes(header);
        if next_index >= capacity {
            return Err(LogError::CorruptHeader {
                index: next_index,
                capacity,
            });
        }
        Ok(Self { inner, next_index })
    }

    /// Header value read when the reader was opened
    pub fn next_index(&self) -> u32 {
        self.next_index
    }
}

impl Iterator for LogReader {
    type Item = LogRecord;

    fn next(&mut self) -> Option<LogRecord> {
        let mut bytes = [0u8; RECORD_SIZE];
        self.inner.read_exact(&mut bytes).ok()?;
        Some(LogRecord::decode(&bytes))
    }
}
