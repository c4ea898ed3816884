//! E2E tests for persistent configuration
//!
//! Tests config round-trip, defaults and how stored settings reach a meter.

use delaymeter::config::AppConfig;
use delaymeter::{AnalysisConfig, DelayMeter};

#[test]
fn test_config_path_location() {
    let path = AppConfig::path();
    assert!(path.ends_with("delaymeter/config.json"));
}

#[test]
fn test_round_trip_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");

    let config = AppConfig {
        reference_device: Some("Mixer Out".to_string()),
        target_device: Some("USB Camera".to_string()),
        sample_rate: 96000,
        analysis: AnalysisConfig::new(1500, 250, false).unwrap(),
        interval_secs: 5,
    };
    config.save(&path).unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    assert!(raw.contains("\"target_device\": \"USB Camera\""));
    assert_eq!(AppConfig::load_from(&path), config);
}

/// Older files without an analysis section still load
#[test]
fn test_backward_compatible_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{"reference_device": "Line In", "sample_rate": 44100}"#).unwrap();

    let config = AppConfig::load_from(&path);
    assert_eq!(config.reference_device.as_deref(), Some("Line In"));
    assert_eq!(config.target_device, None);
    assert_eq!(config.sample_rate, 44100);
    assert_eq!(config.analysis, AnalysisConfig::default());
}

/// Stored settings configure a meter without further validation
#[test]
fn test_loaded_config_drives_meter() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(
        &path,
        r#"{"sample_rate": 32000, "analysis": {"window_ms": 5000, "max_lag_ms": 20, "debug": true}}"#,
    )
    .unwrap();

    let config = AppConfig::load_from(&path);
    let meter = DelayMeter::with_config(config.sample_rate, config.analysis).unwrap();
    let applied = meter.config();
    assert_eq!(meter.sample_rate(), 32000);
    assert_eq!(applied.window_ms, 3000);
    assert_eq!(applied.max_lag_ms, 50);
    assert!(applied.debug);
}

/// An unsupported stored sample rate is reported when the meter is built
#[test]
fn test_invalid_sample_rate_rejected_by_meter() {
    let config = AppConfig {
        sample_rate: 1000,
        ..AppConfig::default()
    };
    assert!(DelayMeter::new(config.sample_rate).is_err());
}
