//! Per-tick telemetry
//!
//! Every tick produces one [`TelemetryRecord`]. Where it goes is up to the
//! sink:
//! - Console lines through `tracing` ([`ConsoleTelemetry`])
//! - CSV file for later analysis ([`csv`])
//!
//! Several sinks can be combined in a `Vec<Box<dyn Telemetry>>`.

pub mod csv;

use chrono::{DateTime, Local};
use thiserror::Error;

pub use self::csv::CsvRecorder;

/// Errors that can occur while writing telemetry
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Telemetry I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One row of telemetry
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryRecord {
    /// Wall-clock time of the measurement
    pub timestamp: DateTime<Local>,
    /// Clamped raw distance (cm)
    pub raw_cm: f64,
    /// Smoothed distance (cm)
    pub filtered_cm: f64,
    /// Whether a below-threshold streak is active
    pub person_detected: bool,
}

/// Append-only record sink
pub trait Telemetry {
    fn record(&mut self, record: &TelemetryRecord) -> Result<(), TelemetryError>;
}

impl<T: Telemetry + ?Sized> Telemetry for Box<T> {
    fn record(&mut self, record: &TelemetryRecord) -> Result<(), TelemetryError> {
        (**self).record(record)
    }
}

/// Fan-out: every sink sees every record, the first error is reported
impl Telemetry for Vec<Box<dyn Telemetry>> {
    fn record(&mut self, record: &TelemetryRecord) -> Result<(), TelemetryError> {
        let mut first_error = None;
        for sink in self.iter_mut() {
            if let Err(e) = sink.record(record) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Logs each record at info level
#[derive(Debug, Default)]
pub struct ConsoleTelemetry;

impl ConsoleTelemetry {
    pub fn new() -> Self {
        Self
    }
}

impl Telemetry for ConsoleTelemetry {
    fn record(&mut self, record: &TelemetryRecord) -> Result<(), TelemetryError> {
        tracing::info!(
            "Distance: {:.2} cm, Filtered: {:.2} cm",
            record.raw_cm,
            record.filtered_cm
        );
        Ok(())
    }
}
