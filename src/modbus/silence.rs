//! # Silent Interval Measurement
//!
//! Modbus RTU delimits frames by elapsed line silence rather than a length
//! prefix. This timer stands in for the free-running hardware counter of
//! the original transport: it is reset whenever a byte arrives and queried
//! before each byte is handed to the slave to derive the `quiet` flag.

use std::time::{Duration, Instant};

use crate::constants::MODBUS_SILENT_INTERVAL_MICROS;

/// Tracks the gap since the previously received byte.
#[derive(Debug)]
pub struct SilenceTimer {
    interval: Duration,
    last_byte: Option<Instant>,
}

impl SilenceTimer {
    /// Timer with the standard RTU silent interval.
    pub fn new() -> Self {
        Self::with_interval(Duration::from_micros(MODBUS_SILENT_INTERVAL_MICROS))
    }

    pub fn with_interval(interval: Duration) -> Self {
        SilenceTimer {
            interval,
            last_byte: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether at least the silent interval has passed since the last byte
    /// at time `now`. Before any byte has been seen the line counts as
    /// quiet.
    pub fn is_quiet_at(&self, now: Instant) -> bool {
        match self.last_byte {
            Some(last) => now.duration_since(last) >= self.interval,
            None => true,
        }
    }

    /// Whether the line is quiet right now.
    pub fn is_quiet(&self) -> bool {
        self.is_quiet_at(Instant::now())
    }

    /// Records a byte arrival, restarting the gap measurement.
    pub fn mark_byte_at(&mut self, at: Instant) {
        self.last_byte = Some(at);
    }

    pub fn mark_byte(&mut self) {
        self.mark_byte_at(Instant::now());
    }
}

impl Default for SilenceTimer {
    fn default() -> Self {
        Self::new()
    }
}
