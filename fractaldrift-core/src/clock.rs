//! Wall-clock abstraction for time-budgeted work.

use std::cell::Cell;
use std::time::Instant;

/// Monotonic milliseconds.
pub trait Clock {
    fn now_ms(&self) -> f64;
}

/// Milliseconds since construction, from `std::time::Instant`.
#[derive(Clone, Copy, Debug)]
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

impl Clock for SystemClock {
    fn now_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

/// Clock driven by hand. Optionally advances by a fixed step on every read,
/// which lets tests model work that takes time.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<f64>,
    auto_step: Cell<f64>,
}

impl ManualClock {
    pub fn new(start_ms: f64) -> Self {
        Self {
            now: Cell::new(start_ms),
            auto_step: Cell::new(0.0),
        }
    }

    /// Every `now_ms()` call advances the clock by `step_ms` after reading.
    pub fn with_auto_step(start_ms: f64, step_ms: f64) -> Self {
        Self {
            now: Cell::new(start_ms),
            auto_step: Cell::new(step_ms),
        }
    }

    pub fn set(&self, now_ms: f64) {
        self.now.set(now_ms);
    }

    pub fn advance(&self, delta_ms: f64) {
        self.now.set(self.now.get() + delta_ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        let now = self.now.get();
        self.now.set(now + self.auto_step.get());
        now
    }
}
