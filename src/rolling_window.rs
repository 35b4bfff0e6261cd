/// Fixed-capacity FIFO of telemetry samples feeding the live chart.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use crate::protocol::TelemetryReading;

pub const DEFAULT_WINDOW_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetrySample {
    /// Capture time, seconds since the Unix epoch
    pub timestamp: f64,
    pub measured: f64,
    pub setpoint: f64,
    pub error: f64,
}

#[derive(Debug, Clone)]
pub struct RollingWindow {
    samples: VecDeque<TelemetrySample>,
    capacity: usize,
}

impl Default for RollingWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_CAPACITY)
    }
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Stamp with the current wall clock and append
    pub fn append(&mut self, reading: TelemetryReading) {
        self.append_at(Utc::now(), reading);
    }

    pub fn append_at(&mut self, at: DateTime<Utc>, reading: TelemetryReading) {
        self.samples.push_back(TelemetrySample {
            timestamp: at.timestamp_micros() as f64 / 1_000_000.0,
            measured: reading.measured,
            setpoint: reading.setpoint,
            error: reading.error,
        });
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    /// Overwrite the setpoint of every buffered sample with `setpoint`.
    ///
    /// Only the displayed target trace moves; measured and error values are kept
    /// as the device reported them.
    pub fn set_target_line(&mut self, setpoint: f64) {
        for sample in self.samples.iter_mut() {
            sample.setpoint = setpoint;
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TelemetrySample> {
        self.samples.iter()
    }

    /// `[t - origin, value]` pairs for one series, ready for plotting
    pub fn series(&self, origin: f64, pick: impl Fn(&TelemetrySample) -> f64) -> Vec<[f64; 2]> {
        self.samples.iter().map(|s| [s.timestamp - origin, pick(s)]).collect()
    }
}
