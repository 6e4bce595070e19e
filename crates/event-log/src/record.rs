//! Binary Log Record

use serde::{Deserialize, Serialize};

/// Encoded size of one record in bytes
pub const RECORD_SIZE: usize = 16;

/// One event in the log.
///
/// On-media layout, little-endian, padding written as zero:
///
/// | offset | size | field       |
/// |--------|------|-------------|
/// | 0      | 4    | `timestamp` |
/// | 4      | 1    | `status`    |
/// | 5      | 3    | padding     |
/// | 8      | 4    | `distance`  |
/// | 12     | 1    | `secondary` |
/// | 13     | 3    | padding     |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Seconds since the Unix epoch, 0 marks an unused slot
    pub timestamp: u32,
    /// Door status
    pub status: u8,
    /// Filtered distance in centimetres
    pub distance: u32,
    /// Vehicle / secondary sensor status
    pub secondary: u8,
}

impl LogRecord {
    /// Filler written to unused slots
    pub const PLACEHOLDER: Self = Self {
        timestamp: 0,
        status: 0,
        distance: 0,
        secondary: 0,
    };

    /// Whether this slot has never been written
    pub fn is_placeholder(&self) -> bool {
        self.timestamp == 0
    }

    /// Encode to the on-media layout
    pub fn encode(&self) -> [u8; RECORD_SIZE] {
        let mut bytes = [0u8; RECORD_SIZE];
        bytes[0..4].copy_from_slice(&self.timestamp.to_le_bytes());
        bytes[4] = self.status;
        bytes[8..12].copy_from_slice(&self.distance.to_le_bytes());
        bytes[12] = self.secondary;
        bytes
    }

    /// Decode from the on-media layout, ignoring padding bytes
    pub fn decode(bytes: &[u8; RECORD_SIZE]) -> Self {
        Self {
            timestamp: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            status: bytes[4],
            distance: u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
            secondary: bytes[12],
        }
    }
}
