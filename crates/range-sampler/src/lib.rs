//! Ultrasonic Range Sampler
//!
//! Captures echo timings from the sensor's edge interrupt into a small
//! circular buffer and turns them into a median-filtered distance.

mod buffer;
mod filter;

pub use buffer::{EchoLevel, EchoSnapshot, RangeSampler};
pub use filter::{clamp_echo, echo_to_distance, median_of};

/// Number of echo samples kept for median filtering
pub const BUFFER_DEPTH: usize = 7;

/// Longest plausible echo in microseconds (sensor's maximum usable range)
pub const MAX_ECHO_US: u32 = 26_233;

/// Centimetres per microsecond of round-trip echo (34320 cm/s / 2 / 10^6)
pub const CM_PER_ECHO_US: f32 = 0.01716;
