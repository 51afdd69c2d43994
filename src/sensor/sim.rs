//! Simulated HC-SR04 for tests and `--simulate` runs
//!
//! [`SimGpio`] implements [`Gpio`] on top of a [`SimClock`]. Every falling
//! edge on the trigger pin asks an echo source for the next [`SimEcho`] and
//! the echo pin then follows that script on the simulated timeline. Each
//! echo read costs a fixed amount of simulated time, which is what lets the
//! pulse timer's busy-waits make progress.

use super::clock::{Clock, SimClock};
use super::gpio::{Gpio, GpioError, Level, PinMode};
use super::pulse::SensorConfig;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

/// Default simulated cost of one pin read
pub const DEFAULT_POLL_COST: Duration = Duration::from_micros(1);

/// Delay between the trigger falling edge and the echo rising edge
pub const ECHO_LATENCY: Duration = Duration::from_micros(250);

/// What the echo line does after one trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimEcho {
    /// Echo goes high after `delay` and stays high for `width`
    Pulse { delay: Duration, width: Duration },
    /// Echo never rises
    Silent,
    /// Echo rises immediately and never falls
    StuckHigh,
    /// Reading the echo pin fails during this measurement
    Fault,
}

impl SimEcho {
    pub fn pulse(delay: Duration, width: Duration) -> Self {
        SimEcho::Pulse { delay, width }
    }

    /// Echo an object at `distance_cm` would produce
    pub fn at_distance(distance_cm: f64) -> Self {
        let round_trip = (distance_cm * 2.0 / crate::SPEED_OF_SOUND_CM_PER_S).max(0.0);
        SimEcho::Pulse {
            delay: ECHO_LATENCY,
            width: Duration::from_secs_f64(round_trip),
        }
    }
}

type EchoSource = Box<dyn FnMut(Duration) -> SimEcho>;

/// Simulated GPIO bank wired to one ultrasonic sensor
pub struct SimGpio {
    clock: SimClock,
    trigger_pin: u8,
    echo_pin: u8,
    modes: HashMap<u8, PinMode>,
    unavailable: Vec<u8>,
    trigger_level: Level,
    poll_cost: Duration,
    source: EchoSource,
    current: Option<(Duration, SimEcho)>,
    triggers: usize,
    trigger_rose_at: Option<Duration>,
    last_trigger_width: Option<Duration>,
}

impl SimGpio {
    /// Create a sensor whose echoes come from `source`, called with the
    /// simulated time of each trigger
    pub fn new<F>(clock: SimClock, config: SensorConfig, source: F) -> Self
    where
        F: FnMut(Duration) -> SimEcho + 'static,
    {
        Self {
            clock,
            trigger_pin: config.trigger_pin(),
            echo_pin: config.echo_pin(),
            modes: HashMap::new(),
            unavailable: Vec::new(),
            trigger_level: Level::Low,
            poll_cost: DEFAULT_POLL_COST,
            source: Box::new(source),
            current: None,
            triggers: 0,
            trigger_rose_at: None,
            last_trigger_width: None,
        }
    }

    /// Create a sensor that replays `echoes` in order, then stays silent
    pub fn scripted(clock: SimClock, config: SensorConfig, echoes: Vec<SimEcho>) -> Self {
        let mut queue: VecDeque<SimEcho> = echoes.into();
        Self::new(clock, config, move |_| {
            queue.pop_front().unwrap_or(SimEcho::Silent)
        })
    }

    /// Set the simulated time consumed by each pin read
    pub fn with_poll_cost(mut self, cost: Duration) -> Self {
        self.poll_cost = cost;
        self
    }

    /// Make configuring `pin` fail, as a missing sysfs node would
    pub fn with_unavailable_pin(mut self, pin: u8) -> Self {
        self.unavailable.push(pin);
        self
    }

    /// Number of trigger pulses fired so far
    pub fn trigger_count(&self) -> usize {
        self.triggers
    }

    /// Simulated time the trigger spent high during the last completed pulse
    pub fn last_trigger_width(&self) -> Option<Duration> {
        self.last_trigger_width
    }

    fn configure(&mut self, pin: u8, mode: PinMode) -> Result<(), GpioError> {
        if self.unavailable.contains(&pin) {
            return Err(GpioError::Backend {
                pin,
                message: "pin not present on simulated header".to_string(),
            });
        }
        self.modes.insert(pin, mode);
        Ok(())
    }

    fn check_mode(&self, pin: u8, expected: PinMode) -> Result<(), GpioError> {
        match self.modes.get(&pin) {
            None => Err(GpioError::NotConfigured(pin)),
            Some(&actual) if actual != expected => Err(GpioError::WrongMode {
                pin,
                expected,
                actual,
            }),
            Some(_) => Ok(()),
        }
    }

    fn echo_level(&self, now: Duration) -> Result<Level, GpioError> {
        let Some((fired_at, echo)) = self.current else {
            return Ok(Level::Low);
        };
        let since = now.saturating_sub(fired_at);
        match echo {
            SimEcho::Pulse { delay, width } => Ok(Level::from(since >= delay && since < delay + width)),
            SimEcho::Silent => Ok(Level::Low),
            SimEcho::StuckHigh => Ok(Level::High),
            SimEcho::Fault => Err(GpioError::Backend {
                pin: self.echo_pin,
                message: "simulated read fault".to_string(),
            }),
        }
    }
}

impl Gpio for SimGpio {
    fn configure_output(&mut self, pin: u8) -> Result<(), GpioError> {
        self.configure(pin, PinMode::Output)
    }

    fn configure_input(&mut self, pin: u8) -> Result<(), GpioError> {
        self.configure(pin, PinMode::Input)
    }

    fn write_digital(&mut self, pin: u8, level: Level) -> Result<(), GpioError> {
        self.check_mode(pin, PinMode::Output)?;
        if pin == self.trigger_pin {
            if self.trigger_level == Level::Low && level == Level::High {
                self.trigger_rose_at = Some(self.clock.now());
            }
            if self.trigger_level == Level::High && level == Level::Low {
                let now = self.clock.now();
                self.last_trigger_width = self.trigger_rose_at.take().map(|rose| now - rose);
                let echo = (self.source)(now);
                self.current = Some((now, echo));
                self.triggers += 1;
            }
            self.trigger_level = level;
        }
        Ok(())
    }

    fn read_digital(&mut self, pin: u8) -> Result<Level, GpioError> {
        self.check_mode(pin, PinMode::Input)?;
        let level = if pin == self.echo_pin {
            self.echo_level(self.clock.now())?
        } else {
            Level::Low
        };
        self.clock.advance(self.poll_cost);
        Ok(level)
    }
}
