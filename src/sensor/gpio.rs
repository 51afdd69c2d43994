//! Digital pin capability
//!
//! The sensor driver only needs four operations on two pins. They are
//! collected in the [`Gpio`] trait so the driver can run on real hardware
//! (`SysfsGpio`, behind the `gpio-hardware` feature) or on the simulated
//! sensor in [`super::sim`].

use thiserror::Error;

/// Logic level of a digital pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

impl Level {
    /// Returns true for [`Level::High`]
    pub fn is_high(self) -> bool {
        self == Level::High
    }
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high {
            Level::High
        } else {
            Level::Low
        }
    }
}

/// Pin direction as configured through the capability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    Input,
    Output,
}

/// Errors that can occur while driving GPIO pins
#[derive(Error, Debug)]
pub enum GpioError {
    #[error("GPIO pin {0} is not configured")]
    NotConfigured(u8),

    #[error("GPIO pin {pin} is configured as {actual:?}, expected {expected:?}")]
    WrongMode {
        pin: u8,
        expected: PinMode,
        actual: PinMode,
    },

    #[error("GPIO backend error on pin {pin}: {message}")]
    Backend { pin: u8, message: String },
}

/// Minimal digital I/O capability used by the pulse timer
pub trait Gpio {
    /// Configure `pin` as a push-pull output
    fn configure_output(&mut self, pin: u8) -> Result<(), GpioError>;

    /// Configure `pin` as an input
    fn configure_input(&mut self, pin: u8) -> Result<(), GpioError>;

    /// Drive an output pin
    fn write_digital(&mut self, pin: u8, level: Level) -> Result<(), GpioError>;

    /// Sample an input pin
    fn read_digital(&mut self, pin: u8) -> Result<Level, GpioError>;
}

#[cfg(feature = "gpio-hardware")]
pub use hardware::SysfsGpio;

#[cfg(feature = "gpio-hardware")]
mod hardware {
    use super::{Gpio, GpioError, Level, PinMode};
    use std::collections::HashMap;
    use std::time::Duration;
    use sysfs_gpio::{Direction, Pin};

    /// GPIO access through `/sys/class/gpio`
    ///
    /// Pins are exported when configured and unexported on drop, with every
    /// output driven low first.
    pub struct SysfsGpio {
        pins: HashMap<u8, (Pin, PinMode)>,
    }

    impl SysfsGpio {
        pub fn new() -> Self {
            Self {
                pins: HashMap::new(),
            }
        }

        fn export(&mut self, pin: u8, mode: PinMode) -> Result<(), GpioError> {
            let handle = Pin::new(u64::from(pin));
            handle.export().map_err(|e| backend(pin, e))?;
            // udev needs a moment to fix permissions on the new nodes
            std::thread::sleep(Duration::from_millis(10));
            let direction = match mode {
                PinMode::Input => Direction::In,
                PinMode::Output => Direction::Low,
            };
            handle.set_direction(direction).map_err(|e| backend(pin, e))?;
            tracing::debug!(pin, ?mode, "Exported GPIO pin");
            self.pins.insert(pin, (handle, mode));
            Ok(())
        }

        fn pin(&self, pin: u8, expected: PinMode) -> Result<&Pin, GpioError> {
            let (handle, actual) = self.pins.get(&pin).ok_or(GpioError::NotConfigured(pin))?;
            if *actual != expected {
                return Err(GpioError::WrongMode {
                    pin,
                    expected,
                    actual: *actual,
                });
            }
            Ok(handle)
        }
    }

    impl Default for SysfsGpio {
        fn default() -> Self {
            Self::new()
        }
    }

    fn backend(pin: u8, e: sysfs_gpio::Error) -> GpioError {
        GpioError::Backend {
            pin,
            message: e.to_string(),
        }
    }

    impl Gpio for SysfsGpio {
        fn configure_output(&mut self, pin: u8) -> Result<(), GpioError> {
            self.export(pin, PinMode::Output)
        }

        fn configure_input(&mut self, pin: u8) -> Result<(), GpioError> {
            self.export(pin, PinMode::Input)
        }

        fn write_digital(&mut self, pin: u8, level: Level) -> Result<(), GpioError> {
            let handle = self.pin(pin, PinMode::Output)?;
            handle
                .set_value(u8::from(level.is_high()))
                .map_err(|e| backend(pin, e))
        }

        fn read_digital(&mut self, pin: u8) -> Result<Level, GpioError> {
            let handle = self.pin(pin, PinMode::Input)?;
            let value = handle.get_value().map_err(|e| backend(pin, e))?;
            Ok(Level::from(value != 0))
        }
    }

    impl Drop for SysfsGpio {
        fn drop(&mut self) {
            for (pin, (handle, mode)) in self.pins.drain() {
                if mode == PinMode::Output {
                    if let Err(e) = handle.set_value(0) {
                        tracing::warn!(pin, error = %e, "Failed to drive GPIO pin low");
                    }
                }
                if let Err(e) = handle.unexport() {
                    tracing::warn!(pin, error = %e, "Failed to unexport GPIO pin");
                }
            }
            tracing::info!("GPIO pins released");
        }
    }
}
