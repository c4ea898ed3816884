//! Analysis settings
//!
//! Pushed by the host at any time; a measurement reads them once, under the
//! meter lock, when it starts.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// Allowed analysis window durations in milliseconds
pub const WINDOW_MS_RANGE: RangeInclusive<u32> = 200..=3000;

/// Allowed lag search limits in milliseconds
pub const MAX_LAG_MS_RANGE: RangeInclusive<u32> = 50..=1500;

/// Supported engine sample rates in Hz
pub const SAMPLE_RATE_RANGE: RangeInclusive<u32> = 8000..=384000;

/// Default analysis window in milliseconds
pub const DEFAULT_WINDOW_MS: u32 = 1000;

/// Default lag search limit in milliseconds
pub const DEFAULT_MAX_LAG_MS: u32 = 500;

fn default_window_ms() -> u32 {
    DEFAULT_WINDOW_MS
}

fn default_max_lag_ms() -> u32 {
    DEFAULT_MAX_LAG_MS
}

/// Window and lag settings for a measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Duration of audio analysed per channel
    #[serde(default = "default_window_ms")]
    pub window_ms: u32,
    /// Largest lag searched in either direction
    #[serde(default = "default_max_lag_ms")]
    pub max_lag_ms: u32,
    /// Log per-measurement diagnostics at info level
    #[serde(default)]
    pub debug: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            window_ms: DEFAULT_WINDOW_MS,
            max_lag_ms: DEFAULT_MAX_LAG_MS,
            debug: false,
        }
    }
}

impl AnalysisConfig {
    /// Build a config, rejecting values outside the allowed ranges
    ///
    /// # Example
    /// ```
    /// use delaymeter_core::AnalysisConfig;
    ///
    /// assert!(AnalysisConfig::new(1000, 500, false).is_ok());
    /// assert!(AnalysisConfig::new(100, 500, false).is_err());
    /// ```
    pub fn new(window_ms: u32, max_lag_ms: u32, debug: bool) -> Result<Self, ConfigError> {
        let config = Self {
            window_ms,
            max_lag_ms,
            debug,
        };
        config.validate()?;
        Ok(config)
    }

    /// Build a config, clamping values into the allowed ranges
    pub fn clamped(window_ms: u32, max_lag_ms: u32, debug: bool) -> Self {
        Self {
            window_ms: window_ms.clamp(*WINDOW_MS_RANGE.start(), *WINDOW_MS_RANGE.end()),
            max_lag_ms: max_lag_ms.clamp(*MAX_LAG_MS_RANGE.start(), *MAX_LAG_MS_RANGE.end()),
            debug,
        }
    }

    /// Check both durations against their ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !WINDOW_MS_RANGE.contains(&self.window_ms) {
            return Err(ConfigError::WindowOutOfRange(self.window_ms));
        }
        if !MAX_LAG_MS_RANGE.contains(&self.max_lag_ms) {
            return Err(ConfigError::MaxLagOutOfRange(self.max_lag_ms));
        }
        Ok(())
    }
}

/// Check an engine sample rate against [`SAMPLE_RATE_RANGE`]
pub fn validate_sample_rate(sample_rate: u32) -> Result<u32, ConfigError> {
    if SAMPLE_RATE_RANGE.contains(&sample_rate) {
        Ok(sample_rate)
    } else {
        Err(ConfigError::InvalidSampleRate(sample_rate))
    }
}
