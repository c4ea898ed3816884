//! Delaymeter - audio delay measurement between two inputs
//!
//! This library re-exports the buffering and estimation core from
//! `delaymeter-core` and adds the host side: device capture, a simulated
//! source pair and persistent configuration.

pub mod capture;
pub mod config;

pub use delaymeter_core::audio;

pub use delaymeter_core::{
    estimate_delay, AnalysisConfig, Channel, DelayMeter, MeasurementResult, MeterStatus,
    NoiseGenerator, OffsetError, OffsetSink, TargetChange,
};
pub use delaymeter_core::{BUFFER_SECONDS, MIN_CORRELATION, MIN_OVERLAP_FRAMES, VERSION};
