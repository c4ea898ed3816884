//! Delaymeter Core - Dual-channel buffering and delay estimation
//!
//! This library measures the time offset between two continuously streamed
//! audio signals (a reference and a target) using pre-emphasized, Hann-windowed,
//! normalized cross-correlation over a bounded lag range. The result carries a
//! correlation score so a host can decide whether to apply it as a sync offset.
//!
//! The host owns device I/O, persistence and display; it talks to the core only
//! through [`DelayMeter`].

pub mod audio;
pub mod config;
pub mod error;
pub mod meter;
pub mod result;

pub use audio::correlation::{estimate_delay, DelayEstimate};
pub use audio::ring::{Channel, ChannelPair, SampleRing};
pub use audio::signal::NoiseGenerator;
pub use audio::snapshot::Snapshot;
pub use config::AnalysisConfig;
pub use error::{ConfigError, MeasureError, OffsetError};
pub use meter::{DelayMeter, MeterStatus, OffsetSink, TargetChange};
pub use result::MeasurementResult;

/// Library version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date injected by build.rs
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Seconds of audio retained per channel
pub const BUFFER_SECONDS: u32 = 5;

/// Minimum number of overlapping samples for a snapshot or a tested lag
pub const MIN_OVERLAP_FRAMES: usize = 1024;

/// Best correlation must reach this value for a delay to be reported
pub const MIN_CORRELATION: f64 = 0.6;

/// First-order pre-emphasis coefficient
pub const PRE_EMPHASIS_ALPHA: f32 = 0.95;

/// Convert a duration in milliseconds to samples, rounded to nearest
///
/// # Example
/// ```
/// use delaymeter_core::ms_to_samples;
///
/// assert_eq!(ms_to_samples(1000, 48000), 48000);
/// assert_eq!(ms_to_samples(1, 44100), 44); // 44.1 rounds down
/// ```
pub fn ms_to_samples(ms: u32, sample_rate: u32) -> usize {
    ((ms as u64 * sample_rate as u64 + 500) / 1000) as usize
}
