//! Configuration for the module and for the two flows that drive it.
//!
//! Every default is the value observed on the 4 channel PT100 module.

use crate::clock::Duration;
use crate::health::{ChannelHealthTracker, DEFAULT_FAULT_THRESHOLD, FaultPolicy};
use crate::register::RegisterMap;

/// Device specific constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModuleConfig {
    pub registers: RegisterMap,
    /// Decoded readings strictly above this are treated as a disconnected sensor.
    pub fault_threshold: f32,
    pub fault_policy: FaultPolicy,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            registers: RegisterMap::default(),
            fault_threshold: DEFAULT_FAULT_THRESHOLD,
            fault_policy: FaultPolicy::Latch,
        }
    }
}

impl ModuleConfig {
    pub fn with_fault_threshold(mut self, threshold: f32) -> Self {
        self.fault_threshold = threshold;
        self
    }

    pub fn with_fault_policy(mut self, policy: FaultPolicy) -> Self {
        self.fault_policy = policy;
        self
    }

    pub fn with_registers(mut self, registers: RegisterMap) -> Self {
        self.registers = registers;
        self
    }

    /// A fresh health tracker for one polling session.
    pub fn health_tracker<const N: usize>(&self) -> ChannelHealthTracker<N> {
        ChannelHealthTracker::new(self.fault_threshold, self.fault_policy)
    }
}

/// Length and cadence of a polling session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub duration: Duration,
    pub interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            duration: Duration::minutes(1),
            interval: Duration::secs(1),
        }
    }
}

impl PollConfig {
    pub const fn new(duration: Duration, interval: Duration) -> Self {
        Self { duration, interval }
    }
}

/// Timing of the calibration flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationConfig {
    /// Pause after each correction write, giving the module time to store it.
    pub write_spacing: Duration,
    /// Pause before reading the measurements again for the before/after comparison.
    pub settle_time: Duration,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            write_spacing: Duration::millis(200),
            settle_time: Duration::secs(3),
        }
    }
}
