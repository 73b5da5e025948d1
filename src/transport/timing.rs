//! Handshake timeout calibration.
//!
//! The wait for the first session reply starts at a configured value and is
//! raised after the first successful connect to four times the measured
//! connect round-trip time when that is larger.

use std::time::Duration;

/// Calibration constants.
pub mod constants {
    pub use crate::core::constants::{DEFAULT_TIMEOUT, RTT_TIMEOUT_MULTIPLIER};
}

/// Per-endpoint handshake timeout.
#[derive(Debug, Clone)]
pub struct TimeoutCalibrator {
    /// Configured floor.
    base: Duration,
    /// Timeout currently in force.
    current: Duration,
    /// Connect time of the first successful connect.
    connect_rtt: Option<Duration>,
    /// Time from sending the first request to the first reply byte.
    first_response: Option<Duration>,
}

impl Default for TimeoutCalibrator {
    fn default() -> Self {
        Self::new(constants::DEFAULT_TIMEOUT)
    }
}

impl TimeoutCalibrator {
    /// Create a calibrator with `base` as the initial timeout.
    pub fn new(base: Duration) -> Self {
        Self {
            base,
            current: base,
            connect_rtt: None,
            first_response: None,
        }
    }

    /// Record a connect round trip.
    ///
    /// Only the first sample calibrates; later connects keep the timeout.
    /// Returns the timeout in force afterwards.
    pub fn on_connect(&mut self, rtt: Duration) -> Duration {
        if self.connect_rtt.is_none() {
            self.connect_rtt = Some(rtt);
            let scaled = rtt.saturating_mul(constants::RTT_TIMEOUT_MULTIPLIER);
            self.current = self.base.max(scaled);
        }
        self.current
    }

    /// Record the latency of the first reply on a fresh connection.
    pub fn on_first_response(&mut self, latency: Duration) {
        self.first_response = Some(latency);
    }

    /// Replace the configured floor and drop any calibration.
    pub fn reset(&mut self, base: Duration) {
        *self = Self::new(base);
    }

    /// Timeout currently in force.
    pub fn timeout(&self) -> Duration {
        self.current
    }

    /// Configured floor.
    pub fn base(&self) -> Duration {
        self.base
    }

    /// Check if a connect sample has been taken.
    pub fn is_calibrated(&self) -> bool {
        self.connect_rtt.is_some()
    }

    /// First connect round trip, if any.
    pub fn connect_rtt(&self) -> Option<Duration> {
        self.connect_rtt
    }

    /// Latest first-reply latency, if any.
    pub fn first_response(&self) -> Option<Duration> {
        self.first_response
    }
}
