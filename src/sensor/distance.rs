//! Pulse duration to distance conversion
//!
//! The HC-SR04 is rated for 2cm to 400cm. Every reading is clamped into
//! that range, and a missing echo is reported as the far end of it.

use super::clock::Clock;
use super::gpio::Gpio;
use super::pulse::{PulseTimer, RawReading};
use crate::{MAX_RANGE_CM, MIN_RANGE_CM, SPEED_OF_SOUND_CM_PER_S};

/// Distance reported when no echo was received (nothing in range)
pub const TIMEOUT_DISTANCE_CM: f64 = MAX_RANGE_CM;

/// Convert one raw reading to a clamped distance in centimeters
///
/// A timeout is not an error here: it means nothing reflected the pulse
/// within range, so it maps to [`TIMEOUT_DISTANCE_CM`].
pub fn distance_from_reading(reading: RawReading) -> f64 {
    match reading {
        RawReading::Timeout(_) => TIMEOUT_DISTANCE_CM,
        RawReading::Pulse(width) => {
            let distance = width.as_secs_f64() * SPEED_OF_SOUND_CM_PER_S / 2.0;
            distance.clamp(MIN_RANGE_CM, MAX_RANGE_CM)
        }
    }
}

/// Produces one clamped distance per call from a [`PulseTimer`]
pub struct DistanceSampler<G: Gpio, C: Clock> {
    timer: PulseTimer<G, C>,
}

impl<G: Gpio, C: Clock> DistanceSampler<G, C> {
    pub fn new(timer: PulseTimer<G, C>) -> Self {
        Self { timer }
    }

    /// Measure once and return the distance in centimeters
    ///
    /// Pin errors during the measurement degrade to the timeout distance so
    /// the caller's loop keeps running.
    pub fn distance_cm(&mut self) -> f64 {
        match self.timer.measure() {
            Ok(reading) => {
                if let RawReading::Timeout(edge) = reading {
                    tracing::trace!(?edge, "Echo timeout, reporting max range");
                }
                distance_from_reading(reading)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Distance measurement failed, reporting max range");
                TIMEOUT_DISTANCE_CM
            }
        }
    }

    pub fn timer(&self) -> &PulseTimer<G, C> {
        &self.timer
    }

    /// The clock shared with the pulse timer
    pub fn clock(&self) -> &C {
        self.timer.clock()
    }
}
