//! Simulated Range Sensor

use range_sampler::{EchoLevel, RangeSampler};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::info;
use trigger_scheduler::TriggerLine;

/// Trigger line with a simulated sensor behind it (no hardware required).
///
/// The echo for a pulse is delivered when the line is next driven low,
/// which is the start of the following trigger cycle. Readings therefore
/// trail the configured echo by one period, as a real sensor whose echo
/// arrives between ticks would.
pub struct MockSensor {
    /// Sampler receiving the echo edges
    sampler: Arc<RangeSampler>,
    /// Echo pulse width in microseconds, shared with whoever moves the target
    echo_us: Arc<AtomicU32>,
    /// Free-running microsecond counter
    clock_us: u32,
}

impl MockSensor {
    /// Create a mock sensor answering with the given echo width
    pub fn new(sampler: Arc<RangeSampler>, echo_us: u32) -> Self {
        info!("Creating mock range sensor, echo {}us", echo_us);
        Self {
            sampler,
            echo_us: Arc::new(AtomicU32::new(echo_us)),
            clock_us: 0,
        }
    }

    /// Handle for changing the echo width after the sensor has been moved
    /// into the scheduler
    pub fn echo_control(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.echo_us)
    }

    /// Current simulated counter value
    pub fn clock_us(&self) -> u32 {
        self.clock_us
    }

    fn deliver_echo(&mut self) {
        let width = self.echo_us.load(Ordering::Relaxed);
        self.sampler.on_echo_edge(EchoLevel::High, self.clock_us);
        self.clock_us = self.clock_us.wrapping_add(width);
        self.sampler.on_echo_edge(EchoLevel::Low, self.clock_us);
    }
}

impl TriggerLine for MockSensor {
    fn set_high(&mut self) {}

    fn set_low(&mut self) {
        if self.sampler.is_triggered() {
            self.deliver_echo();
        }
    }

    fn delay_us(&mut self, us: u32) {
        self.clock_us = self.clock_us.wrapping_add(us);
    }
}
