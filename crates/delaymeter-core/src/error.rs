//! Error types for measurement, configuration and offset application
//!
//! None of these are fatal. [`DelayMeter::measure`](crate::DelayMeter::measure)
//! turns every [`MeasureError`] into a published, invalid
//! [`MeasurementResult`](crate::MeasurementResult).

use thiserror::Error;

/// Reasons a measurement produced no delay
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MeasureError {
    #[error("no target source selected")]
    NoTarget,

    #[error("target source '{name}' is not available")]
    TargetUnavailable { name: String },

    #[error("insufficient buffered audio: reference={reference}, target={target}")]
    InsufficientAudio { reference: usize, target: usize },

    #[error("insufficient correlation")]
    InsufficientCorrelation {
        /// Best correlation seen, `None` if every lag was rejected
        best: Option<f64>,
    },

    #[error("failed to allocate {frames} frame working buffers")]
    AllocationFailed { frames: usize },

    #[error("target source '{name}' was replaced during the measurement")]
    TargetChanged { name: String },
}

/// Invalid engine or analysis settings
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("sample rate {0} Hz outside supported range 8000..=384000")]
    InvalidSampleRate(u32),

    #[error("analysis window {0} ms outside 200..=3000")]
    WindowOutOfRange(u32),

    #[error("max lag {0} ms outside 50..=1500")]
    MaxLagOutOfRange(u32),
}

/// Failure reported by an [`OffsetSink`](crate::OffsetSink)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OffsetError {
    #[error("no parent source")]
    NoParent,

    #[error("parent source unavailable")]
    ParentUnavailable,

    #[error("offset rejected: {0}")]
    Rejected(String),
}
