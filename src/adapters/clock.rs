//! Clock adapters.
//!
//! - [`SystemClock`] reads wall-clock milliseconds since the Unix epoch.
//! - [`ManualClock`] is stepped by hand for replay and simulation.

use std::cell::Cell;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::app::ports::ClockPort;

/// Wall-clock time source.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl ClockPort for SystemClock {
    /// Milliseconds since the Unix epoch; 0 if the system clock reads
    /// before the epoch.
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }
}

/// Hand-stepped time source.
#[derive(Debug, Default, Clone)]
pub struct ManualClock {
    now_ms: Cell<u64>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now_ms: Cell::new(start_ms),
        }
    }

    pub fn set(&self, now_ms: u64) {
        self.now_ms.set(now_ms);
    }

    pub fn advance(&self, delta_ms: u64) {
        self.now_ms.set(self.now_ms.get().saturating_add(delta_ms));
    }
}

impl ClockPort for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.get()
    }
}
