//! Garage Controller
//!
//! Owns the device state (options, event log, range sampler) and wires it
//! to the trigger scheduler. Network, HTTP and GPIO actuation live outside
//! this crate.

mod context;
mod door;
mod mock;
mod settings;

pub use context::{DeviceContext, Reading};
pub use door::{classify_door, classify_vehicle, DoorStatus, VehicleStatus};
pub use mock::MockSensor;
pub use settings::RuntimeConfig;

use event_log::LogError;
use option_store::StoreError;
use thiserror::Error;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use trigger_scheduler::SchedulerError;

/// Controller errors
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Option store error: {0}")]
    Store(#[from] StoreError),

    #[error("Event log error: {0}")]
    Log(#[from] LogError),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),
}

/// Initialize logging at the given level name, INFO if it does not parse
pub fn init_logging(level: &str) -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    let level = level.parse::<Level>().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
}
