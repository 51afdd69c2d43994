//! CSV sensor log
//!
//! Files are named `sensor_log_YYYYMMDD_HHMMSS.csv` and start with the
//! header `timestamp,raw_distance_cm,filtered_distance_cm,person_detected`.
//! Each record is flushed immediately so the log survives a hard stop.

use super::{Telemetry, TelemetryError, TelemetryRecord};
use chrono::Local;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

/// CSV header line
pub const CSV_HEADER: &str = "timestamp,raw_distance_cm,filtered_distance_cm,person_detected";

/// Timestamp format of the first column (millisecond precision)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Appends telemetry rows to a CSV file
pub struct CsvRecorder {
    path: PathBuf,
    writer: BufWriter<File>,
    rows: u64,
}

impl CsvRecorder {
    /// Create a timestamped log file inside `dir`, creating `dir` if needed
    ///
    /// Never overwrites an existing log: a second recorder started within
    /// the same second gets a `_1`, `_2`, ... suffix.
    pub fn create_in(dir: &Path) -> Result<Self, TelemetryError> {
        fs::create_dir_all(dir)?;
        let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        Self::create_unique(dir, &stamp)
    }

    fn create_unique(dir: &Path, stamp: &str) -> Result<Self, TelemetryError> {
        let mut suffix = 0u32;
        loop {
            let name = if suffix == 0 {
                format!("sensor_log_{}.csv", stamp)
            } else {
                format!("sensor_log_{}_{}.csv", stamp, suffix)
            };
            let path = dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Self::start(path, file),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => suffix += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Create (truncate) the log at `path` and write the header
    pub fn create(path: PathBuf) -> Result<Self, TelemetryError> {
        let file = File::create(&path)?;
        Self::start(path, file)
    }

    fn start(path: PathBuf, file: File) -> Result<Self, TelemetryError> {
        let mut writer = BufWriter::new(file);
        writeln!(writer, "{}", CSV_HEADER)?;
        writer.flush()?;
        tracing::info!(path = %path.display(), "Sensor log created");

        Ok(Self {
            path,
            writer,
            rows: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows written so far, header excluded
    pub fn rows(&self) -> u64 {
        self.rows
    }
}

/// Format one record as a CSV line (without newline)
pub fn format_row(record: &TelemetryRecord) -> String {
    format!(
        "{},{:.2},{:.2},{}",
        record.timestamp.format(TIMESTAMP_FORMAT),
        record.raw_cm,
        record.filtered_cm,
        u8::from(record.person_detected)
    )
}

impl Telemetry for CsvRecorder {
    fn record(&mut self, record: &TelemetryRecord) -> Result<(), TelemetryError> {
        writeln!(self.writer, "{}", format_row(record))?;
        self.writer.flush()?;
        self.rows += 1;
        Ok(())
    }
}

impl Drop for CsvRecorder {
    fn drop(&mut self) {
        let _ = self.writer.flush();
        tracing::info!(path = %self.path.display(), rows = self.rows, "Sensor log saved");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_row() {
        let record = TelemetryRecord {
            timestamp: Local
                .with_ymd_and_hms(2024, 5, 17, 14, 3, 9)
                .unwrap()
                + chrono::Duration::milliseconds(42),
            raw_cm: 87.456,
            filtered_cm: 90.0,
            person_detected: true,
        };
        assert_eq!(format_row(&record), "2024-05-17 14:03:09.042,87.46,90.00,1");
    }

    #[test]
    fn test_create_in_makes_directory_and_header() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logs");
        let recorder = CsvRecorder::create_in(&logs).unwrap();

        let name = recorder.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("sensor_log_") && name.ends_with(".csv"));

        let contents = fs::read_to_string(recorder.path()).unwrap();
        assert_eq!(contents, format!("{}\n", CSV_HEADER));
    }

    #[test]
    fn test_same_second_recorders_keep_separate_logs() {
        let dir = tempfile::tempdir().unwrap();
        let record = TelemetryRecord {
            timestamp: Local::now(),
            raw_cm: 55.0,
            filtered_cm: 60.0,
            person_detected: true,
        };

        let stamp = "20240517_140309";
        let mut first = CsvRecorder::create_unique(dir.path(), stamp).unwrap();
        first.record(&record).unwrap();
        let second = CsvRecorder::create_unique(dir.path(), stamp).unwrap();
        let third = CsvRecorder::create_unique(dir.path(), stamp).unwrap();

        let names: Vec<String> = [&first, &second, &third]
            .iter()
            .map(|r| r.path().file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec![
                "sensor_log_20240517_140309.csv",
                "sensor_log_20240517_140309_1.csv",
                "sensor_log_20240517_140309_2.csv",
            ]
        );

        let contents = fs::read_to_string(first.path()).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.ends_with(",55.00,60.00,1\n"));
    }
}
