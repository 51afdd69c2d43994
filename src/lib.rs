//! Presence Player - ultrasonic presence detection with music playback
//!
//! Polls an HC-SR04 rangefinder every 100ms, smooths the distance with a
//! zero-phase Butterworth low-pass, and starts a random track when someone
//! stays closer than 100cm for more than half a second. The track stops when
//! they walk away.

pub mod config;
pub mod orchestrator;
pub mod playback;
pub mod presence;
pub mod sensor;
pub mod signal;
pub mod telemetry;

use std::time::Duration;

pub use config::AppConfig;
pub use orchestrator::{DistanceSample, Orchestrator, TickReport};
pub use playback::{DisabledPlayback, Playback, TrackLibrary};
pub use presence::detector::{DetectionState, PlaybackEvent, PresenceDetector};
pub use sensor::clock::{Clock, MonotonicClock, SimClock};
pub use sensor::distance::DistanceSampler;
pub use sensor::gpio::{Gpio, GpioError, Level};
pub use sensor::pulse::{PulseTimer, RawReading, SensorConfig};
pub use signal::filter::{Filtered, SignalFilter};
pub use telemetry::{ConsoleTelemetry, CsvRecorder, Telemetry, TelemetryRecord};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Speed of sound in air at room temperature (cm/s)
pub const SPEED_OF_SOUND_CM_PER_S: f64 = 34300.0;

/// Closest distance the HC-SR04 can resolve (cm)
pub const MIN_RANGE_CM: f64 = 2.0;

/// Farthest distance the HC-SR04 can resolve (cm)
pub const MAX_RANGE_CM: f64 = 400.0;

/// Sleep between two control loop ticks
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
