//! HC-SR04 trigger/echo pulse timing
//!
//! A measurement is a 10µs trigger pulse followed by two bounded busy-waits
//! on the echo line: one for the rising edge, one for the falling edge. The
//! echo high time is the ultrasonic round trip.
//!
//! Timeouts are enforced by comparing clock time on every poll iteration,
//! never by counting iterations, so the bound holds regardless of how fast
//! the pin can be read.

use super::clock::Clock;
use super::gpio::{Gpio, GpioError, Level};
use std::time::Duration;

/// Width of the trigger pulse
pub const TRIGGER_PULSE: Duration = Duration::from_micros(10);

/// Time the sensor needs after the trigger is first driven low
pub const SETTLE_TIME: Duration = Duration::from_millis(50);

/// Default echo wait bound (30ms, roughly 5m of round trip)
pub const DEFAULT_ECHO_TIMEOUT: Duration = Duration::from_millis(30);

/// Default trigger pin (BCM numbering)
pub const DEFAULT_TRIGGER_PIN: u8 = 27;

/// Default echo pin (BCM numbering)
pub const DEFAULT_ECHO_PIN: u8 = 17;

/// Wiring and timing of one rangefinder. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorConfig {
    trigger_pin: u8,
    echo_pin: u8,
    timeout: Duration,
}

impl SensorConfig {
    pub fn new(trigger_pin: u8, echo_pin: u8, timeout: Duration) -> Self {
        Self {
            trigger_pin,
            echo_pin,
            timeout,
        }
    }

    pub fn trigger_pin(&self) -> u8 {
        self.trigger_pin
    }

    pub fn echo_pin(&self) -> u8 {
        self.echo_pin
    }

    /// Bound applied to each of the two edge waits
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self::new(DEFAULT_TRIGGER_PIN, DEFAULT_ECHO_PIN, DEFAULT_ECHO_TIMEOUT)
    }
}

/// Which echo edge never arrived
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EchoEdge {
    Rising,
    Falling,
}

/// Outcome of a single trigger/echo cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawReading {
    /// Echo high time
    Pulse(Duration),
    /// An edge wait exceeded the configured timeout
    Timeout(EchoEdge),
}

/// Busy-wait echo timer for an HC-SR04 style sensor
pub struct PulseTimer<G: Gpio, C: Clock> {
    gpio: G,
    clock: C,
    config: SensorConfig,
}

impl<G: Gpio, C: Clock> PulseTimer<G, C> {
    /// Configure the pins and let the sensor settle
    ///
    /// Fails if either pin cannot be configured; without pin access there is
    /// nothing to measure.
    pub fn new(mut gpio: G, clock: C, config: SensorConfig) -> Result<Self, GpioError> {
        gpio.configure_output(config.trigger_pin)?;
        gpio.configure_input(config.echo_pin)?;
        gpio.write_digital(config.trigger_pin, Level::Low)?;
        clock.sleep(SETTLE_TIME);

        tracing::info!(
            trigger = config.trigger_pin,
            echo = config.echo_pin,
            timeout_ms = config.timeout.as_secs_f64() * 1000.0,
            "Ultrasonic sensor ready"
        );

        Ok(Self {
            gpio,
            clock,
            config,
        })
    }

    pub fn config(&self) -> &SensorConfig {
        &self.config
    }

    /// The pin backend this timer drives
    pub fn gpio(&self) -> &G {
        &self.gpio
    }

    /// The clock this timer measures with
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Fire the trigger and time the echo pulse
    pub fn measure(&mut self) -> Result<RawReading, GpioError> {
        let trigger = self.config.trigger_pin;
        let echo = self.config.echo_pin;
        let timeout = self.config.timeout;

        self.gpio.write_digital(trigger, Level::High)?;
        self.clock.sleep(TRIGGER_PULSE);
        self.gpio.write_digital(trigger, Level::Low)?;

        // Rising edge: the last low sample marks the pulse start
        let wait_start = self.clock.now();
        let mut pulse_start = wait_start;
        while self.gpio.read_digital(echo)? == Level::Low {
            pulse_start = self.clock.now();
            if pulse_start.saturating_sub(wait_start) > timeout {
                return Ok(RawReading::Timeout(EchoEdge::Rising));
            }
        }

        // Falling edge: the last high sample marks the pulse end
        let wait_start = self.clock.now();
        let mut pulse_end = wait_start;
        while self.gpio.read_digital(echo)? == Level::High {
            pulse_end = self.clock.now();
            if pulse_end.saturating_sub(wait_start) > timeout {
                return Ok(RawReading::Timeout(EchoEdge::Falling));
            }
        }

        Ok(RawReading::Pulse(pulse_end.saturating_sub(pulse_start)))
    }
}
