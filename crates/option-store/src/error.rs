//! Option Store Error Types

use thiserror::Error;

/// Errors while reading, changing or persisting options
#[derive(Debug, Error)]
pub enum StoreError {
    /// Integer value above the option's bound
    #[error("{name} value {value} is out of range [0, {max}]")]
    OutOfRange {
        name: &'static str,
        value: u32,
        max: u32,
    },

    /// Integer accessor used on a string option or vice versa
    #[error("{name} is not an {expected} option")]
    KindMismatch {
        name: &'static str,
        expected: &'static str,
    },

    /// Value cannot be stored in the text format
    #[error("Invalid value for {name}: {reason}")]
    InvalidValue {
        name: &'static str,
        reason: &'static str,
    },

    /// Backing file could not be read or written
    #[error("Option file I/O error: {0}")]
    Io(#[from] std::io::Error),
}
