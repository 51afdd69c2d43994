//! E2E tests for persistent configuration
//!
//! Tests file round-trip, defaults for missing fields, validation, and that
//! the loaded values reach the components they configure.

use presence_player::config::{AppConfig, ConfigError};
use presence_player::presence::detector::PresenceDetector;
use presence_player::signal::filter::{Filtered, SignalFilter};
use std::path::PathBuf;
use std::time::Duration;

#[test]
fn test_missing_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = AppConfig::load(&dir.path().join("absent.json"));
    assert_eq!(config, AppConfig::default());
}

#[test]
fn test_partial_file_keeps_other_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(
        &path,
        r#"{"trigger_pin": 23, "echo_pin": 24, "music_dir": "/srv/music", "sustain_ms": 800}"#,
    )
    .unwrap();

    let config = AppConfig::load(&path);
    assert_eq!(config.trigger_pin, 23);
    assert_eq!(config.echo_pin, 24);
    assert_eq!(config.music_dir, PathBuf::from("/srv/music"));
    assert_eq!(config.sustain(), Duration::from_millis(800));
    assert_eq!(config.threshold_cm, 100.0);
    assert_eq!(config.window_capacity, 30);
    assert!(config.validate().is_ok());
}

#[test]
fn test_saved_config_loads_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a").join("b").join("config.json");

    let config = AppConfig {
        threshold_cm: 75.0,
        log_dir: None,
        audio_enabled: false,
        ..AppConfig::default()
    };
    config.save(&path).unwrap();

    assert!(path.exists());
    assert_eq!(AppConfig::load(&path), config);
}

#[test]
fn test_invalid_values_rejected() {
    let shared = AppConfig {
        trigger_pin: 17,
        echo_pin: 17,
        ..AppConfig::default()
    };
    assert_eq!(shared.validate(), Err(ConfigError::SharedPin(17)));

    let no_poll = AppConfig {
        poll_interval_ms: 0,
        ..AppConfig::default()
    };
    assert_eq!(no_poll.validate(), Err(ConfigError::ZeroPollInterval));

    let empty_window = AppConfig {
        window_capacity: 0,
        ..AppConfig::default()
    };
    assert!(empty_window.validate().is_err());
}

#[test]
fn test_values_reach_components() {
    let config = AppConfig {
        window_capacity: 5,
        min_filter_samples: 3,
        threshold_cm: 60.0,
        sustain_ms: 200,
        ..AppConfig::default()
    };
    assert!(config.validate().is_ok());

    let mut filter = SignalFilter::with_params(config.filter_params());
    for v in 0..8 {
        filter.push(v as f64);
    }
    assert_eq!(filter.len(), 5);
    // 5 samples can never cover the low-pass padding
    assert!(matches!(filter.filtered(), Some(Filtered::Fallback { .. })));

    let detector = PresenceDetector::with_params(config.threshold_cm, config.sustain());
    assert_eq!(detector.threshold_cm(), 60.0);
    assert_eq!(detector.sustain(), Duration::from_millis(200));

    let sensor = config.sensor_config();
    assert_eq!(sensor.trigger_pin(), 27);
    assert_eq!(sensor.timeout(), Duration::from_millis(30));
}
