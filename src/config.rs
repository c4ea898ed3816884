//! Persistent application configuration
//!
//! Stores the device pair, sample rate and analysis settings in a JSON file
//! at `<data_dir>/delaymeter/config.json`.

use delaymeter_core::AnalysisConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Sample rate used when none is configured
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

/// Seconds between measurements in continuous mode
pub const DEFAULT_INTERVAL_SECS: u64 = 2;

fn default_sample_rate() -> u32 {
    DEFAULT_SAMPLE_RATE
}

fn default_interval_secs() -> u64 {
    DEFAULT_INTERVAL_SECS
}

/// Persistent application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Input device carrying the reference signal (None = default input)
    #[serde(default)]
    pub reference_device: Option<String>,
    /// Input device carrying the delayed signal
    #[serde(default)]
    pub target_device: Option<String>,
    /// Sample rate in Hz, shared by both inputs
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Window and lag settings
    #[serde(default)]
    pub analysis: AnalysisConfig,
    /// Measurement period in seconds
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            reference_device: None,
            target_device: None,
            sample_rate: default_sample_rate(),
            analysis: AnalysisConfig::default(),
            interval_secs: default_interval_secs(),
        }
    }
}

impl AppConfig {
    /// Config file path: `<data_dir>/delaymeter/config.json`
    pub fn path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("delaymeter")
            .join("config.json")
    }

    /// Load config from the default location
    pub fn load() -> Self {
        Self::load_from(&Self::path())
    }

    /// Load config from `path`, falling back to defaults on any error
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<Self>(&contents) {
                Ok(config) => {
                    tracing::info!(path = %path.display(), "Loaded config from disk");
                    config.sanitized()
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

    /// Save config to `path`, creating parent directories if needed
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        tracing::info!(path = %path.display(), "Config saved to disk");
        Ok(())
    }

    /// Clamp analysis settings and the interval into usable ranges
    fn sanitized(mut self) -> Self {
        let analysis = AnalysisConfig::clamped(
            self.analysis.window_ms,
            self.analysis.max_lag_ms,
            self.analysis.debug,
        );
        if analysis != self.analysis {
            tracing::warn!(
                window_ms = self.analysis.window_ms,
                max_lag_ms = self.analysis.max_lag_ms,
                "Stored analysis settings out of range, clamped"
            );
            self.analysis = analysis;
        }
        self.interval_secs = self.interval_secs.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.reference_device, None);
        assert_eq!(config.target_device, None);
        assert_eq!(config.sample_rate, 48000);
        assert_eq!(config.analysis, AnalysisConfig::default());
        assert_eq!(config.interval_secs, 2);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let json = r#"{"target_device": "USB Camera"}"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.target_device.as_deref(), Some("USB Camera"));
        assert_eq!(config.sample_rate, 48000);
        assert_eq!(config.analysis.window_ms, 1000);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = AppConfig {
            reference_device: Some("Mixer".to_string()),
            target_device: Some("Camera".to_string()),
            sample_rate: 44100,
            analysis: AnalysisConfig::new(2000, 300, true).unwrap(),
            interval_secs: 10,
        };
        config.save(&path).unwrap();

        assert_eq!(AppConfig::load_from(&path), config);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(&dir.path().join("absent.json"));
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_load_corrupt_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(AppConfig::load_from(&path), AppConfig::default());
    }

    #[test]
    fn test_load_clamps_stored_analysis() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"analysis": {"window_ms": 10, "max_lag_ms": 99999}, "interval_secs": 0}"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path);
        assert_eq!(config.analysis.window_ms, 200);
        assert_eq!(config.analysis.max_lag_ms, 1500);
        assert_eq!(config.interval_secs, 1);
    }
}
