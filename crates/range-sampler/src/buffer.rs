//! Interrupt-Shared Echo Buffer

use crate::filter::{clamp_echo, echo_to_distance, median_of};
use crate::BUFFER_DEPTH;
use core::cell::RefCell;
use critical_section::Mutex;
use tracing::debug;

/// Level of the echo line observed by the edge interrupt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EchoLevel {
    /// Line went high: echo pulse started
    High,
    /// Line went low: echo pulse ended
    Low,
}

/// State written by the echo interrupt and read by the foreground
#[derive(Debug, Clone, Copy)]
struct EchoState {
    samples: [u32; BUFFER_DEPTH],
    cursor: usize,
    full: bool,
    triggered: bool,
    start_us: u32,
    captured: u32,
}

impl EchoState {
    const EMPTY: Self = Self {
        samples: [0; BUFFER_DEPTH],
        cursor: 0,
        full: false,
        triggered: false,
        start_us: 0,
        captured: 0,
    };
}

/// Consistent copy of the sample buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EchoSnapshot {
    /// Clamped echo durations in microseconds, in slot order
    pub samples: [u32; BUFFER_DEPTH],
    /// Slot the next capture will be written to
    pub cursor: usize,
    /// Whether the cursor has wrapped at least once
    pub full: bool,
}

impl EchoSnapshot {
    /// Most recently captured sample, if any
    pub fn latest(&self) -> Option<u32> {
        if self.cursor > 0 {
            Some(self.samples[self.cursor - 1])
        } else if self.full {
            Some(self.samples[BUFFER_DEPTH - 1])
        } else {
            None
        }
    }

    /// Number of valid samples
    pub fn len(&self) -> usize {
        if self.full {
            BUFFER_DEPTH
        } else {
            self.cursor
        }
    }

    /// Check if no sample has been captured yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Echo sampler shared between the edge interrupt and the foreground.
///
/// Every access goes through a critical section, so the interrupt can never
/// observe or produce a half-updated buffer. Critical sections only hold
/// fixed-size copies.
///
/// An edge left over from a previous cycle that arrives after a new trigger
/// is attributed to the new cycle; the `triggered` gate cannot tell the two
/// apart.
pub struct RangeSampler {
    state: Mutex<RefCell<EchoState>>,
}

impl RangeSampler {
    /// Create an empty sampler (usable in a `static`)
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(RefCell::new(EchoState::EMPTY)),
        }
    }

    /// Mark a trigger pulse as outstanding so the next echo is captured
    pub fn arm(&self) {
        critical_section::with(|cs| {
            self.state.borrow_ref_mut(cs).triggered = true;
        });
    }

    /// Echo edge interrupt handler body.
    ///
    /// `now_us` is the free-running microsecond counter at the edge. Edges
    /// are ignored unless a trigger is outstanding; the falling edge closes
    /// the cycle.
    pub fn on_echo_edge(&self, level: EchoLevel, now_us: u32) {
        critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            if !state.triggered {
                return;
            }

            match level {
                EchoLevel::High => state.start_us = now_us,
                EchoLevel::Low => {
                    state.triggered = false;
                    let cursor = state.cursor;
                    state.samples[cursor] = clamp_echo(now_us.wrapping_sub(state.start_us));
                    state.cursor = (cursor + 1) % BUFFER_DEPTH;
                    if state.cursor == 0 {
                        state.full = true;
                    }
                    state.captured = state.captured.wrapping_add(1);
                }
            }
        });
    }

    /// Take a consistent copy of the buffer
    pub fn snapshot(&self) -> EchoSnapshot {
        critical_section::with(|cs| {
            let state = self.state.borrow_ref(cs);
            EchoSnapshot {
                samples: state.samples,
                cursor: state.cursor,
                full: state.full,
            }
        })
    }

    /// Filtered distance in centimetres.
    ///
    /// Never waits for a new measurement. Until the buffer has filled once
    /// this is the latest raw sample (0 before any capture); afterwards it is
    /// the median of the whole window. A sensor that stops answering leaves
    /// the last value in place.
    pub fn read_distance(&self) -> u32 {
        let snapshot = self.snapshot();
        if !snapshot.full {
            return snapshot.latest().map_or(0, echo_to_distance);
        }
        echo_to_distance(median_of(&snapshot.samples))
    }

    /// Whether a trigger is waiting for its echo
    pub fn is_triggered(&self) -> bool {
        critical_section::with(|cs| self.state.borrow_ref(cs).triggered)
    }

    /// Total captures since creation or reset (wraps)
    pub fn sample_count(&self) -> u32 {
        critical_section::with(|cs| self.state.borrow_ref(cs).captured)
    }

    /// Drop all samples and any outstanding trigger
    pub fn reset(&self) {
        critical_section::with(|cs| {
            *self.state.borrow_ref_mut(cs) = EchoState::EMPTY;
        });
        debug!("Range sampler reset");
    }
}

impl Default for RangeSampler {
    fn default() -> Self {
        Self::new()
    }
}
