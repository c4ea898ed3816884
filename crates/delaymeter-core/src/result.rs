//! Measurement outcomes and their user-facing text
//!
//! Every measurement, successful or not, produces a [`MeasurementResult`]
//! with a short summary line and a longer detail line. Only successful
//! measurements are marked `valid` and carry a delay that may be applied as
//! a sync offset.

use crate::audio::correlation::DelayEstimate;
use crate::error::{MeasureError, OffsetError};
use crate::{MIN_CORRELATION, MIN_OVERLAP_FRAMES};
use chrono::{DateTime, Local, Utc};
use serde::Serialize;

/// Summary shown before the first measurement
pub const READY_TEXT: &str = "Ready...";

/// Direction of the target relative to the reference
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Direction {
    /// Target is delayed by the given milliseconds
    Lags(f64),
    /// Target is early by the given milliseconds
    Leads(f64),
    /// Exactly zero offset
    Aligned,
}

impl Direction {
    /// Classify a signed delay; only an exact zero counts as aligned
    pub fn from_delay_ms(delay_ms: f64) -> Self {
        if delay_ms > 0.0 {
            Direction::Lags(delay_ms)
        } else if delay_ms < 0.0 {
            Direction::Leads(delay_ms.abs())
        } else {
            Direction::Aligned
        }
    }
}

/// Published outcome of a measurement or offset application
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasurementResult {
    /// Signed delay in milliseconds (positive: target lags reference)
    pub delay_ms: f64,
    /// Normalized correlation at the reported delay
    pub correlation: f64,
    /// True only when `delay_ms` comes from an accepted measurement
    pub valid: bool,
    /// One-line outcome
    pub summary_text: String,
    /// Explanation or hint
    pub detail_text: String,
    /// When the result was produced
    pub timestamp: DateTime<Utc>,
}

impl MeasurementResult {
    fn new(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            delay_ms: 0.0,
            correlation: 0.0,
            valid: false,
            summary_text: summary.into(),
            detail_text: detail.into(),
            timestamp: Utc::now(),
        }
    }

    /// Placeholder held until the first measurement
    pub fn ready() -> Self {
        Self::new(READY_TEXT, "")
    }

    /// Accepted delay estimate
    ///
    /// # Example
    /// ```
    /// use delaymeter_core::{DelayEstimate, MeasurementResult};
    ///
    /// let estimate = DelayEstimate {
    ///     lag_samples: 240,
    ///     delay_ms: 5.0,
    ///     correlation: 0.998,
    ///     frames: 48000,
    ///     max_lag: 24000,
    ///     lags_evaluated: 48001,
    /// };
    /// let result = MeasurementResult::success(&estimate, "Camera");
    /// assert!(result.valid);
    /// assert_eq!(result.summary_text, "  +5.0 ms (correlation: 0.998)");
    /// assert_eq!(result.detail_text, "Target 'Camera' lags reference by 5.0 ms");
    /// ```
    pub fn success(estimate: &DelayEstimate, target_name: &str) -> Self {
        let delay_ms = estimate.delay_ms;
        let summary = format!(
            "{:+6.1} ms (correlation: {:.3})",
            delay_ms, estimate.correlation
        );
        let detail = match Direction::from_delay_ms(delay_ms) {
            Direction::Lags(ms) => {
                format!("Target '{}' lags reference by {:.1} ms", target_name, ms)
            }
            Direction::Leads(ms) => {
                format!("Target '{}' leads reference by {:.1} ms", target_name, ms)
            }
            Direction::Aligned => format!("Target '{}' is aligned with reference", target_name),
        };

        Self {
            delay_ms,
            correlation: estimate.correlation,
            valid: true,
            ..Self::new(summary, detail)
        }
    }

    /// Rejected measurement
    pub fn failure(error: &MeasureError) -> Self {
        match error {
            MeasureError::NoTarget => Self::new(
                "No target source",
                "Select a delayed source to compare against.",
            ),
            MeasureError::TargetUnavailable { name } => Self::new(
                "Target not available",
                format!(
                    "Target '{}' is not delivering audio; check that the source exists.",
                    name
                ),
            ),
            MeasureError::InsufficientAudio { reference, target } => Self::new(
                "Buffers too small",
                format!(
                    "Need more buffered audio from both reference and target before measuring \
                     (reference: {}, target: {}, need {} samples).",
                    reference, target, MIN_OVERLAP_FRAMES
                ),
            ),
            MeasureError::InsufficientCorrelation { best } => {
                let detail = match best {
                    Some(best) => format!(
                        "Insufficient correlation ({:.3} < {:.1}); ensure both sources carry \
                         similar program audio.",
                        best, MIN_CORRELATION
                    ),
                    None => "Insufficient correlation; ensure both sources carry similar \
                             program audio."
                        .to_string(),
                };
                Self::new(
                    "Insufficient correlation - check audio levels and similarity",
                    detail,
                )
            }
            MeasureError::AllocationFailed { frames } => Self::new(
                "Measurement aborted - out of memory",
                format!("Could not allocate working buffers for {} frames.", frames),
            ),
            MeasureError::TargetChanged { name } => Self::new(
                "Target changed during measurement",
                format!(
                    "Measured against '{}', which is no longer the selected target.",
                    name
                ),
            ),
        }
    }

    /// Keep the delay and correlation of `previous` on an invalid outcome
    ///
    /// Rejections only replace the texts of the published record. Valid
    /// results are returned unchanged.
    pub fn carry_numbers_from(self, previous: &MeasurementResult) -> Self {
        if self.valid {
            return self;
        }
        Self {
            delay_ms: previous.delay_ms,
            correlation: previous.correlation,
            ..self
        }
    }

    /// Offset handed to the sink
    pub fn offset_applied(delay_ms: f64, correlation: f64) -> Self {
        Self {
            delay_ms,
            correlation,
            valid: true,
            ..Self::new(
                format!("Applied {:+.1} ms to Sync Offset", delay_ms),
                "Sync Offset updated on reference source.",
            )
        }
    }

    /// Offset requested without a valid measurement
    pub fn no_recent_measurement() -> Self {
        Self::new(
            "No recent measurement",
            "Run Measure Now before applying offset.",
        )
    }

    /// Offset refused by the sink
    pub fn offset_failed(error: &OffsetError) -> Self {
        match error {
            OffsetError::NoParent => Self::new(
                "No parent source",
                "Cannot apply offset without a parent source.",
            ),
            OffsetError::ParentUnavailable => Self::new(
                "Parent unavailable",
                "Parent source vanished before applying offset.",
            ),
            OffsetError::Rejected(reason) => Self::new("Offset rejected", reason.clone()),
        }
    }

    /// Direction of a valid result, `None` otherwise
    pub fn direction(&self) -> Option<Direction> {
        self.valid.then(|| Direction::from_delay_ms(self.delay_ms))
    }

    /// Delay in nanoseconds, rounded to nearest, for a valid result
    pub fn offset_ns(&self) -> Option<i64> {
        self.valid.then(|| delay_ms_to_ns(self.delay_ms))
    }

    /// Local wall-clock time of the result as `HH:MM:SS`
    pub fn time_text(&self) -> String {
        self.timestamp
            .with_timezone(&Local)
            .format("%H:%M:%S")
            .to_string()
    }
}

impl Default for MeasurementResult {
    fn default() -> Self {
        Self::ready()
    }
}

/// Convert milliseconds to nanoseconds, rounded to nearest
pub fn delay_ms_to_ns(delay_ms: f64) -> i64 {
    (delay_ms * 1_000_000.0).round() as i64
}
