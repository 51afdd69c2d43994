//! Persistent application configuration
//!
//! Sensor wiring, filter and detection tunables, and directories, stored as
//! JSON. Missing fields take their defaults so a partial file is valid.

use crate::presence::detector::{DEFAULT_SUSTAIN, DEFAULT_THRESHOLD_CM};
use crate::sensor::pulse::{
    SensorConfig, DEFAULT_ECHO_PIN, DEFAULT_ECHO_TIMEOUT, DEFAULT_TRIGGER_PIN,
};
use crate::signal::filter::{
    FilterParams, CUTOFF_HZ, MIN_FILTER_SAMPLES, SAMPLE_RATE_HZ, WINDOW_CAPACITY,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Config file used when `--config` is not given
pub const DEFAULT_CONFIG_PATH: &str = "presence-player.json";

/// Values that cannot drive the sensor loop
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Trigger and echo must be different pins (both are {0})")]
    SharedPin(u8),

    #[error("Echo timeout must be positive")]
    ZeroTimeout,

    #[error("Poll interval must be positive")]
    ZeroPollInterval,

    #[error("Filter window must hold at least one sample and min_filter_samples ({min_samples}) must fit in it ({capacity})")]
    InvalidWindow { capacity: usize, min_samples: usize },

    #[error("Presence threshold must be a positive distance, got {0}")]
    InvalidThreshold(f64),
}

fn default_trigger_pin() -> u8 {
    DEFAULT_TRIGGER_PIN
}

fn default_echo_pin() -> u8 {
    DEFAULT_ECHO_PIN
}

fn default_echo_timeout_us() -> u64 {
    DEFAULT_ECHO_TIMEOUT.as_micros() as u64
}

fn default_window_capacity() -> usize {
    WINDOW_CAPACITY
}

fn default_min_filter_samples() -> usize {
    MIN_FILTER_SAMPLES
}

fn default_cutoff_hz() -> f64 {
    CUTOFF_HZ
}

fn default_sample_rate_hz() -> f64 {
    SAMPLE_RATE_HZ
}

fn default_threshold_cm() -> f64 {
    DEFAULT_THRESHOLD_CM
}

fn default_sustain_ms() -> u64 {
    DEFAULT_SUSTAIN.as_millis() as u64
}

fn default_poll_interval_ms() -> u64 {
    crate::DEFAULT_POLL_INTERVAL.as_millis() as u64
}

fn default_music_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_true() -> bool {
    true
}

/// Persistent application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Trigger pin (BCM numbering)
    #[serde(default = "default_trigger_pin")]
    pub trigger_pin: u8,
    /// Echo pin (BCM numbering)
    #[serde(default = "default_echo_pin")]
    pub echo_pin: u8,
    /// Bound on each echo edge wait, in microseconds
    #[serde(default = "default_echo_timeout_us")]
    pub echo_timeout_us: u64,

    #[serde(default = "default_window_capacity")]
    pub window_capacity: usize,
    /// Below this many samples the filter reports the plain mean
    #[serde(default = "default_min_filter_samples")]
    pub min_filter_samples: usize,
    #[serde(default = "default_cutoff_hz")]
    pub cutoff_hz: f64,
    #[serde(default = "default_sample_rate_hz")]
    pub sample_rate_hz: f64,

    /// Distance below which someone counts as present (cm)
    #[serde(default = "default_threshold_cm")]
    pub threshold_cm: f64,
    /// How long the distance must stay below threshold before playing
    #[serde(default = "default_sustain_ms")]
    pub sustain_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Directory scanned for tracks
    #[serde(default = "default_music_dir")]
    pub music_dir: PathBuf,
    /// Directory for CSV sensor logs (None = no CSV log)
    #[serde(default = "default_log_dir_opt")]
    pub log_dir: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub audio_enabled: bool,
}

fn default_log_dir_opt() -> Option<PathBuf> {
    Some(default_log_dir())
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            trigger_pin: default_trigger_pin(),
            echo_pin: default_echo_pin(),
            echo_timeout_us: default_echo_timeout_us(),
            window_capacity: default_window_capacity(),
            min_filter_samples: default_min_filter_samples(),
            cutoff_hz: default_cutoff_hz(),
            sample_rate_hz: default_sample_rate_hz(),
            threshold_cm: default_threshold_cm(),
            sustain_ms: default_sustain_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            music_dir: default_music_dir(),
            log_dir: default_log_dir_opt(),
            audio_enabled: default_true(),
        }
    }
}

impl AppConfig {
    /// Load config from disk, falling back to defaults on any error
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    tracing::info!(path = %path.display(), "Loaded config from disk");
                    config
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to parse config, using defaults");
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!(path = %path.display(), "No config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Save config to disk, creating parent directories if needed
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        tracing::info!(path = %path.display(), "Config saved to disk");
        Ok(())
    }

    /// Reject values the sensor loop cannot run with
    ///
    /// Filter cutoff and sample rate are not checked here: a bad pair only
    /// disables smoothing, which the filter reports itself.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.trigger_pin == self.echo_pin {
            return Err(ConfigError::SharedPin(self.trigger_pin));
        }
        if self.echo_timeout_us == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }
        if self.window_capacity == 0
            || self.min_filter_samples == 0
            || self.min_filter_samples > self.window_capacity
        {
            return Err(ConfigError::InvalidWindow {
                capacity: self.window_capacity,
                min_samples: self.min_filter_samples,
            });
        }
        if !(self.threshold_cm.is_finite() && self.threshold_cm > 0.0) {
            return Err(ConfigError::InvalidThreshold(self.threshold_cm));
        }
        Ok(())
    }

    pub fn sensor_config(&self) -> SensorConfig {
        SensorConfig::new(
            self.trigger_pin,
            self.echo_pin,
            Duration::from_micros(self.echo_timeout_us),
        )
    }

    pub fn filter_params(&self) -> FilterParams {
        FilterParams {
            capacity: self.window_capacity,
            min_samples: self.min_filter_samples,
            cutoff_hz: self.cutoff_hz,
            sample_rate_hz: self.sample_rate_hz,
        }
    }

    pub fn sustain(&self) -> Duration {
        Duration::from_millis(self.sustain_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
