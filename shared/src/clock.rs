//! Shared network time source.

use std::cell::Cell;
use std::time::Instant;

/// Monotonic network time in seconds, agreed between server and clients.
pub trait NetworkClock {
    fn now(&self) -> f64;

    /// Round-trip estimate in seconds.
    fn rtt(&self) -> f64 {
        0.0
    }
}

/// Seconds since the clock was created. The server's clock is the network
/// time every client synchronizes against.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkClock for SystemClock {
    fn now(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

/// Hand-driven clock for simulations and tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<f64>,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self {
            now: Cell::new(start),
        }
    }

    pub fn advance(&self, dt: f64) {
        self.now.set(self.now.get() + dt);
    }

    pub fn set(&self, now: f64) {
        self.now.set(now);
    }
}

impl NetworkClock for ManualClock {
    fn now(&self) -> f64 {
        self.now.get()
    }
}
