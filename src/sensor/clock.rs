//! Time source for the measurement loop
//!
//! Everything that waits or measures elapsed time goes through [`Clock`],
//! so the pulse timer and the presence detector can run against a simulated
//! clock in tests without real delays.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Monotonic time source with the ability to wait
pub trait Clock {
    /// Time elapsed since the clock's origin
    fn now(&self) -> Duration;

    /// Block (or advance simulated time) for `duration`
    fn sleep(&self, duration: Duration);
}

/// Wall-clock implementation backed by [`Instant`]
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Create a clock whose origin is the current instant
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        // thread::sleep cannot resolve sub-100µs waits
        if duration < Duration::from_micros(100) {
            let deadline = Instant::now() + duration;
            while Instant::now() < deadline {
                std::hint::spin_loop();
            }
        } else {
            std::thread::sleep(duration);
        }
    }
}

/// Simulated clock that only moves when told to
///
/// Clones share the same time, so a [`SimGpio`](super::sim::SimGpio) and the
/// components it drives observe one consistent timeline.
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    now: Rc<Cell<Duration>>,
}

impl SimClock {
    /// Create a simulated clock starting at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Move simulated time forward
    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    /// Jump to an absolute simulated time (never backwards)
    pub fn set(&self, at: Duration) {
        if at > self.now.get() {
            self.now.set(at);
        }
    }
}

impl Clock for SimClock {
    fn now(&self) -> Duration {
        self.now.get()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}
