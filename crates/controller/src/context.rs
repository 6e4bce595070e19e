//! Device Context

use crate::door::{classify_door, classify_vehicle, DoorStatus, VehicleStatus};
use crate::{ControllerError, RuntimeConfig};
use event_log::{EventLog, LogRecord};
use option_store::{OptionId, OptionStore, FIRMWARE_VERSION};
use range_sampler::RangeSampler;
use serde::Serialize;
use std::fs;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use trigger_scheduler::{SchedulerConfig, SchedulerHandle, TriggerLine, TriggerScheduler};

/// One classified distance reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Reading {
    /// Filtered distance in centimetres
    pub distance: u32,
    pub door: DoorStatus,
    pub vehicle: VehicleStatus,
}

/// Single owner of the device state, created once at startup
pub struct DeviceContext {
    options: OptionStore,
    log: EventLog,
    sampler: Arc<RangeSampler>,
    /// Door status of the last logged reading
    last_status: Option<DoorStatus>,
}

impl DeviceContext {
    /// Open the stores named by the runtime configuration and run option
    /// setup.
    ///
    /// Persistence failures are logged and the device carries on with
    /// defaults; only an unusable log capacity is fatal.
    pub fn open(config: &RuntimeConfig) -> Result<Self, ControllerError> {
        if let Err(e) = fs::create_dir_all(&config.data_dir) {
            warn!("Cannot create data dir {}: {}", config.data_dir.display(), e);
        }

        let mut options = OptionStore::new(config.config_path());
        match options.setup(FIRMWARE_VERSION) {
            Ok(outcome) => info!("Options ready: {:?}", outcome),
            Err(e) => {
                warn!("Option file unreadable, using defaults: {}", e);
                options.restore_defaults();
            }
        }
        for id in options.out_of_range() {
            warn!("Option {} outside its range", id.name());
        }

        let log = EventLog::with_capacity(config.log_path(), config.log_capacity)?;
        info!(
            "Device context opened: {} ({} log slots)",
            config.data_dir.display(),
            log.capacity()
        );

        Ok(Self {
            options,
            log,
            sampler: Arc::new(RangeSampler::new()),
            last_status: None,
        })
    }

    pub fn options(&self) -> &OptionStore {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut OptionStore {
        &mut self.options
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn log_mut(&mut self) -> &mut EventLog {
        &mut self.log
    }

    /// Shared sampler fed by the echo interrupt
    pub fn sampler(&self) -> &Arc<RangeSampler> {
        &self.sampler
    }

    /// Classify a distance with the configured mount type and door threshold
    pub fn door_status(&self, distance: u32) -> DoorStatus {
        let mount = self.options.int(OptionId::MountType).unwrap_or(0);
        let threshold = self.options.int(OptionId::DoorThreshold).unwrap_or(0);
        classify_door(mount, threshold, distance)
    }

    /// Classify vehicle presence with the configured vehicle threshold
    pub fn vehicle_status(&self, distance: u32, door: DoorStatus) -> VehicleStatus {
        let threshold = self.options.int(OptionId::VehicleThreshold).unwrap_or(0);
        classify_vehicle(door, threshold, distance)
    }

    /// Current filtered distance with its classification
    pub fn read_status(&self) -> Reading {
        let distance = self.sampler.read_distance();
        let door = self.door_status(distance);
        Reading {
            distance,
            door,
            vehicle: self.vehicle_status(distance, door),
        }
    }

    /// Classify the current distance and append it to the event log when
    /// the door status differs from the last logged one.
    ///
    /// Returns the appended record. Nothing is logged before the first echo
    /// has been captured, and the first reading after startup only sets the
    /// baseline.
    pub fn record_reading(&mut self, timestamp: u32) -> Option<LogRecord> {
        if self.sampler.snapshot().is_empty() {
            return None;
        }

        let reading = self.read_status();
        let Some(previous) = self.last_status else {
            debug!("Baseline door status {:?} at {}cm", reading.door, reading.distance);
            self.last_status = Some(reading.door);
            return None;
        };
        if previous == reading.door {
            return None;
        }

        let record = LogRecord {
            timestamp,
            status: reading.door as u8,
            distance: reading.distance,
            secondary: reading.vehicle as u8,
        };
        match self.log.append(&record) {
            Ok(()) => {
                info!(
                    "Door {:?} -> {:?} at {}cm",
                    previous, reading.door, reading.distance
                );
                self.last_status = Some(reading.door);
                Some(record)
            }
            Err(e) => {
                warn!("Failed to log door change: {}", e);
                None
            }
        }
    }

    /// Erase options and log, drop buffered samples.
    ///
    /// Every step runs even if an earlier one fails; the first persistence
    /// error is returned afterwards.
    pub fn factory_reset(&mut self) -> Result<(), ControllerError> {
        warn!("Factory reset");
        let options = self.options.reset();
        let log = self.log.reset();
        self.sampler.reset();
        self.last_status = None;

        options?;
        log?;
        Ok(())
    }

    /// Start the trigger scheduler on its own task, arming this context's
    /// sampler after every pulse
    pub fn start_scheduler<L: TriggerLine + 'static>(
        &self,
        line: L,
        config: SchedulerConfig,
    ) -> Result<(SchedulerHandle, JoinHandle<TriggerScheduler<L>>), ControllerError> {
        let scheduler = TriggerScheduler::new(line, Arc::clone(&self.sampler), config)?;
        Ok(scheduler.spawn())
    }
}
