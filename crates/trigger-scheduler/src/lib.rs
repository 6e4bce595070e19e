//! Trigger Scheduler for the Ultrasonic Sensor
//!
//! Fires the sensor's trigger pulse at a fixed cadence, independent of
//! foreground activity, and arms the range sampler for the echo.

mod scheduler;

pub use scheduler::{SchedulerConfig, SchedulerHandle, TriggerLine, TriggerScheduler};

use thiserror::Error;

/// Scheduler errors
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Invalid scheduler config: {0}")]
    InvalidConfig(String),
}
