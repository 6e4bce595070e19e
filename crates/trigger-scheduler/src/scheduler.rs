//! Trigger Scheduler Implementation

use crate::SchedulerError;
use range_sampler::RangeSampler;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Shortest trigger pulse the sensor accepts (microseconds)
const MIN_PULSE_US: u32 = 2;
/// Longest trigger pulse before it overlaps the echo (microseconds)
const MAX_PULSE_US: u32 = 20;

/// Digital output driving the sensor's trigger input
pub trait TriggerLine: Send {
    /// Drive the line high
    fn set_high(&mut self);
    /// Drive the line low
    fn set_low(&mut self);
    /// Busy-wait for the given number of microseconds
    fn delay_us(&mut self, us: u32);
}

/// Configuration for the trigger scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Interval between trigger pulses in milliseconds (default: 250)
    pub period_ms: u64,
    /// Low time before the pulse so the sensor sees a clean edge
    pub settle_us: u32,
    /// Trigger pulse width in microseconds
    pub pulse_us: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            period_ms: 250,
            settle_us: 2,
            pulse_us: 20,
        }
    }
}

impl SchedulerConfig {
    /// Check the cadence and pulse width against sensor limits
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.period_ms == 0 {
            return Err(SchedulerError::InvalidConfig(
                "trigger period must be non-zero".to_string(),
            ));
        }
        if !(MIN_PULSE_US..=MAX_PULSE_US).contains(&self.pulse_us) {
            return Err(SchedulerError::InvalidConfig(format!(
                "trigger pulse of {}us outside {}..={}us",
                self.pulse_us, MIN_PULSE_US, MAX_PULSE_US
            )));
        }
        Ok(())
    }

    /// Interval between pulses
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

/// Stops a running scheduler
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    stop_tx: Arc<watch::Sender<bool>>,
}

impl SchedulerHandle {
    /// Ask the scheduler loop to exit after the current tick
    pub fn stop(&self) {
        info!("Stopping trigger scheduler");
        let _ = self.stop_tx.send(true);
    }
}

/// Periodic trigger source for the range sensor.
///
/// Firing while the previous echo is still outstanding is fine: the
/// sampler only re-arms its gate.
pub struct TriggerScheduler<L: TriggerLine> {
    /// Trigger output
    line: L,
    /// Sampler armed after every pulse
    sampler: Arc<RangeSampler>,
    /// Configuration
    config: SchedulerConfig,
    /// Pulses issued so far
    fired: u64,
}

impl<L: TriggerLine> TriggerScheduler<L> {
    /// Create a new scheduler
    pub fn new(
        line: L,
        sampler: Arc<RangeSampler>,
        config: SchedulerConfig,
    ) -> Result<Self, SchedulerError> {
        config.validate()?;
        info!(
            "Trigger scheduler created: every {}ms, {}us pulse",
            config.period_ms, config.pulse_us
        );
        Ok(Self {
            line,
            sampler,
            config,
            fired: 0,
        })
    }

    /// Emit one trigger pulse and arm the sampler for its echo
    pub fn fire(&mut self) {
        self.line.set_low();
        self.line.delay_us(self.config.settle_us);
        self.line.set_high();
        self.line.delay_us(self.config.pulse_us);
        self.line.set_low();
        self.sampler.arm();

        self.fired += 1;
        metrics::counter!("trigger_pulses_total").increment(1);
    }

    /// Number of pulses issued
    pub fn fired(&self) -> u64 {
        self.fired
    }

    /// Get the configuration
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Get the trigger line
    pub fn line(&self) -> &L {
        &self.line
    }

    /// Fire on every period until stopped.
    ///
    /// Late ticks are skipped rather than bunched. If every stop sender is
    /// dropped the loop keeps running.
    pub async fn run(&mut self, mut stop: watch::Receiver<bool>) {
        info!("Starting trigger scheduler");
        let mut ticker = tokio::time::interval(self.config.period());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut stop_open = true;

        loop {
            tokio::select! {
                _ = ticker.tick() => self.fire(),
                changed = stop.changed(), if stop_open => match changed {
                    Ok(()) if *stop.borrow_and_update() => break,
                    Ok(()) => {}
                    Err(_) => {
                        debug!("Stop handle dropped, scheduler runs for device lifetime");
                        stop_open = false;
                    }
                },
            }
        }

        info!("Trigger scheduler stopped after {} pulses", self.fired);
    }
}

impl<L: TriggerLine + 'static> TriggerScheduler<L> {
    /// Run the scheduler on its own task
    pub fn spawn(mut self) -> (SchedulerHandle, JoinHandle<Self>) {
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            self.run(stop_rx).await;
            self
        });
        (
            SchedulerHandle {
                stop_tx: Arc::new(stop_tx),
            },
            task,
        )
    }
}
