//! Delay meter: the shared state shell around the measurement pipeline
//!
//! One [`DelayMeter`] is owned per session. Producers push frames for each
//! channel from whatever thread the host delivers them on, a trigger calls
//! [`DelayMeter::measure`], and readers fetch [`DelayMeter::last_result`].
//!
//! ## Locking
//!
//! All mutable state (both rings, the analysis settings, the target slot and
//! the result cache) sits behind a single mutex:
//! - appends hold it while writing their frames
//! - a measurement holds it once, for the bulk copy of the analysis window
//! - publishing holds it only to replace the cached result
//!
//! Conditioning and the lag search run on a private [`Snapshot`] with the lock
//! released, so concurrent measurements are safe; only publication is
//! serialized. Each capture takes a sequence number under the lock, and a
//! measurement that finishes after a newer one has published is dropped.
//! The lock is never held across a call into host code.

use crate::audio::correlation::{estimate_delay, max_lag_samples, DelayEstimate};
use crate::audio::ring::{Channel, ChannelPair};
use crate::audio::snapshot::{capture_recent, window_frames, Snapshot};
use crate::config::{validate_sample_rate, AnalysisConfig};
use crate::error::{ConfigError, MeasureError, OffsetError};
use crate::result::{delay_ms_to_ns, MeasurementResult};
use crate::MIN_OVERLAP_FRAMES;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// Log at info when the debug setting is on, at debug otherwise
macro_rules! diag {
    ($enabled:expr, $($arg:tt)+) => {
        if $enabled {
            tracing::info!($($arg)+)
        } else {
            tracing::debug!($($arg)+)
        }
    };
}

/// Consumer of a computed sync offset
///
/// Implemented by the host for whatever ultimately applies the delay
/// (e.g. a playback sync offset). Closures taking the offset in nanoseconds
/// implement it too.
pub trait OffsetSink {
    /// Adopt `offset_ns` as the consumer's sync offset
    fn apply_sync_offset(&mut self, offset_ns: i64) -> Result<(), OffsetError>;
}

impl<F> OffsetSink for F
where
    F: FnMut(i64) -> Result<(), OffsetError>,
{
    fn apply_sync_offset(&mut self, offset_ns: i64) -> Result<(), OffsetError> {
        self(offset_ns)
    }
}

/// Effect of [`DelayMeter::set_target_identity`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetChange {
    /// Same target as before (or still none)
    Unchanged,
    /// A different target was selected; its buffer was cleared
    Selected,
    /// The target was removed; its buffer was cleared
    Cleared,
}

/// Point-in-time view of the meter for display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeterStatus {
    pub sample_rate: u32,
    pub capacity: usize,
    pub reference_frames: usize,
    pub target_frames: usize,
    pub target: Option<String>,
    pub target_available: bool,
    pub config: AnalysisConfig,
    pub measurement_count: u64,
}

#[derive(Debug)]
struct TargetSlot {
    name: String,
    available: bool,
}

/// Everything guarded by the meter lock
#[derive(Debug)]
struct MeterState {
    channels: ChannelPair,
    config: AnalysisConfig,
    target: Option<TargetSlot>,
    /// Most recent outcome of any kind
    last_result: MeasurementResult,
    /// Most recent accepted measurement, the only source for offsets
    last_valid: Option<MeasurementResult>,
    /// Sequence number handed to the latest capture
    captured_seq: u64,
    /// Sequence number of the latest published measurement
    published_seq: u64,
}

/// Analysis window copied out under the lock
#[derive(Debug)]
struct Captured {
    snapshot: Snapshot,
    config: AnalysisConfig,
    target_name: String,
}

/// Dual-channel delay meter
pub struct DelayMeter {
    sample_rate: u32,
    state: Mutex<MeterState>,
    measurements: AtomicU64,
}

impl DelayMeter {
    /// Create a meter with default analysis settings
    ///
    /// # Example
    /// ```
    /// use delaymeter_core::DelayMeter;
    ///
    /// let meter = DelayMeter::new(48000).unwrap();
    /// assert_eq!(meter.status().capacity, 240000);
    /// assert!(DelayMeter::new(0).is_err());
    /// ```
    pub fn new(sample_rate: u32) -> Result<Self, ConfigError> {
        Self::with_config(sample_rate, AnalysisConfig::default())
    }

    /// Create a meter with the given analysis settings
    pub fn with_config(sample_rate: u32, config: AnalysisConfig) -> Result<Self, ConfigError> {
        let sample_rate = validate_sample_rate(sample_rate)?;
        config.validate()?;

        let channels = ChannelPair::new(sample_rate);
        tracing::info!(
            sample_rate,
            capacity = channels.capacity(),
            window_ms = config.window_ms,
            max_lag_ms = config.max_lag_ms,
            "Delay meter created"
        );

        Ok(Self {
            sample_rate,
            state: Mutex::new(MeterState {
                channels,
                config,
                target: None,
                last_result: MeasurementResult::ready(),
                last_valid: None,
                captured_seq: 0,
                published_seq: 0,
            }),
            measurements: AtomicU64::new(0),
        })
    }

    fn lock(&self) -> MutexGuard<'_, MeterState> {
        // Locked sections are plain memory operations; a panic elsewhere
        // cannot leave the state half-written.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Producer entry point for reference frames
    pub fn on_reference_frames(&self, samples: &[f32]) {
        self.append(Channel::Reference, samples);
    }

    /// Producer entry point for target frames
    pub fn on_target_frames(&self, samples: &[f32]) {
        self.append(Channel::Target, samples);
    }

    /// Append frames to one channel, evicting the oldest once full
    pub fn append(&self, channel: Channel, samples: &[f32]) {
        if samples.is_empty() {
            return;
        }
        self.lock().channels.append(channel, samples);
    }

    /// Update the analysis settings, clamping into the allowed ranges
    ///
    /// Takes effect on the next measurement.
    pub fn configure(&self, window_ms: u32, max_lag_ms: u32, debug: bool) {
        let config = AnalysisConfig::clamped(window_ms, max_lag_ms, debug);
        if config.window_ms != window_ms || config.max_lag_ms != max_lag_ms {
            tracing::warn!(
                window_ms,
                max_lag_ms,
                clamped_window_ms = config.window_ms,
                clamped_max_lag_ms = config.max_lag_ms,
                "Analysis settings out of range, clamped"
            );
        }
        self.lock().config = config;
        tracing::debug!(?config, "Analysis settings updated");
    }

    /// Replace the analysis settings, rejecting out-of-range values
    pub fn set_config(&self, config: AnalysisConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.lock().config = config;
        Ok(())
    }

    /// Current analysis settings
    pub fn config(&self) -> AnalysisConfig {
        self.lock().config
    }

    /// Select the upstream that produces target frames
    ///
    /// An empty name clears the target. Reselecting the current non-empty
    /// name does nothing. Any real change discards buffered target frames.
    pub fn set_target_identity(&self, name: &str) -> TargetChange {
        let change = {
            let mut state = self.lock();
            let change = match (&state.target, name.is_empty()) {
                (None, true) => TargetChange::Unchanged,
                (Some(_), true) => TargetChange::Cleared,
                (Some(current), false) if current.name == name => TargetChange::Unchanged,
                (_, false) => TargetChange::Selected,
            };

            match change {
                TargetChange::Unchanged => {}
                TargetChange::Cleared => {
                    state.target = None;
                    state.channels.reset(Channel::Target);
                }
                TargetChange::Selected => {
                    state.target = Some(TargetSlot {
                        name: name.to_string(),
                        available: true,
                    });
                    state.channels.reset(Channel::Target);
                }
            }
            change
        };

        match change {
            TargetChange::Selected => tracing::info!(target_name = name, "Target source selected"),
            TargetChange::Cleared => tracing::info!("Target source cleared"),
            TargetChange::Unchanged => {}
        }
        change
    }

    /// Report whether the selected target could be resolved by the host
    ///
    /// Ignored when no target is selected.
    pub fn set_target_available(&self, available: bool) {
        let mut state = self.lock();
        if let Some(target) = state.target.as_mut() {
            if target.available != available {
                target.available = available;
                tracing::info!(
                    target_name = %target.name,
                    available,
                    "Target availability changed"
                );
            }
        }
    }

    /// Name of the selected target, if any
    pub fn target_identity(&self) -> Option<String> {
        self.lock().target.as_ref().map(|t| t.name.clone())
    }

    /// Discard all buffered frames on both channels
    pub fn clear_buffers(&self) {
        let mut state = self.lock();
        state.channels.reset(Channel::Reference);
        state.channels.reset(Channel::Target);
    }

    /// Snapshot of buffer fill, target and settings
    pub fn status(&self) -> MeterStatus {
        let state = self.lock();
        MeterStatus {
            sample_rate: self.sample_rate,
            capacity: state.channels.capacity(),
            reference_frames: state.channels.ring(Channel::Reference).len(),
            target_frames: state.channels.ring(Channel::Target).len(),
            target: state.target.as_ref().map(|t| t.name.clone()),
            target_available: state.target.as_ref().is_some_and(|t| t.available),
            config: state.config,
            measurement_count: self.measurements.load(Ordering::Relaxed),
        }
    }

    /// Run a full measurement and publish its outcome
    ///
    /// Never fails: problems are reported as a result with `valid == false`.
    /// A rejected measurement only replaces the texts of the last result; its
    /// delay and correlation stay those of the previous record, and the delay
    /// used by [`apply_offset`](Self::apply_offset) is untouched.
    pub fn measure(&self) -> MeasurementResult {
        let started = Instant::now();
        let count = self.measurements.fetch_add(1, Ordering::Relaxed) + 1;

        let (seq, captured) = self.capture();
        let outcome = captured.and_then(|captured| self.evaluate(captured));
        let result = self.publish(seq, outcome);

        tracing::info!(
            measurement = count,
            valid = result.valid,
            elapsed_ms = started.elapsed().as_millis() as u64,
            detail = %result.detail_text,
            "Result={}",
            result.summary_text
        );
        result
    }

    /// Condition the private snapshot and search for the best lag
    fn evaluate(&self, captured: Captured) -> Result<(DelayEstimate, String), MeasureError> {
        let Captured {
            mut snapshot,
            config,
            target_name,
        } = captured;

        snapshot.condition();
        let estimate = estimate_delay(&snapshot, self.sample_rate, config.max_lag_ms);

        match &estimate {
            Ok(estimate) => diag!(
                config.debug,
                best_lag = estimate.lag_samples,
                best_corr = %format!("{:.4}", estimate.correlation),
                lags_evaluated = estimate.lags_evaluated,
                "Correlation search complete"
            ),
            Err(MeasureError::InsufficientCorrelation { best }) => tracing::info!(
                best = ?best,
                threshold = crate::MIN_CORRELATION,
                "Correlation too low"
            ),
            Err(_) => {}
        }

        estimate.map(|estimate| (estimate, target_name))
    }

    /// Validate the target and copy the analysis window under the lock
    ///
    /// The returned sequence number orders this capture against all others.
    fn capture(&self) -> (u64, Result<Captured, MeasureError>) {
        let mut state = self.lock();
        state.captured_seq += 1;
        let seq = state.captured_seq;
        (seq, Self::capture_locked(&state, self.sample_rate))
    }

    fn capture_locked(state: &MeterState, sample_rate: u32) -> Result<Captured, MeasureError> {
        let config = state.config;

        let target_name = match &state.target {
            None => return Err(MeasureError::NoTarget),
            Some(target) if !target.available => {
                return Err(MeasureError::TargetUnavailable {
                    name: target.name.clone(),
                })
            }
            Some(target) => target.name.clone(),
        };

        let reference = state.channels.ring(Channel::Reference).len();
        let target = state.channels.ring(Channel::Target).len();
        let frames = window_frames(&state.channels, config.window_ms);
        diag!(
            config.debug,
            reference,
            target,
            frames,
            max_lag = max_lag_samples(frames, sample_rate, config.max_lag_ms),
            "Starting measurement"
        );

        if reference < MIN_OVERLAP_FRAMES || target < MIN_OVERLAP_FRAMES {
            return Err(MeasureError::InsufficientAudio { reference, target });
        }

        let snapshot = capture_recent(&state.channels, config.window_ms)?;
        Ok(Captured {
            snapshot,
            config,
            target_name,
        })
    }

    /// Turn an outcome into the published record
    ///
    /// A delay measured against a target that has since been replaced is
    /// rejected. Outcomes older than the latest published measurement are
    /// returned to the caller but not stored.
    fn publish(
        &self,
        seq: u64,
        outcome: Result<(DelayEstimate, String), MeasureError>,
    ) -> MeasurementResult {
        let mut state = self.lock();

        let outcome = match outcome {
            Ok((estimate, measured)) => match &state.target {
                Some(target) if target.name == measured => Ok((estimate, measured)),
                _ => Err(MeasureError::TargetChanged { name: measured }),
            },
            Err(error) => Err(error),
        };
        let result = match outcome {
            Ok((estimate, target_name)) => MeasurementResult::success(&estimate, &target_name),
            Err(error) => {
                MeasurementResult::failure(&error).carry_numbers_from(&state.last_result)
            }
        };

        if seq < state.published_seq {
            tracing::debug!(
                seq,
                published = state.published_seq,
                "Measurement superseded, not published"
            );
            return result;
        }

        state.published_seq = seq;
        if result.valid {
            state.last_valid = Some(result.clone());
        }
        state.last_result = result.clone();
        result
    }

    /// Most recently published result of any kind
    pub fn last_result(&self) -> MeasurementResult {
        self.lock().last_result.clone()
    }

    /// Most recent accepted measurement, if any
    pub fn last_valid_result(&self) -> Option<MeasurementResult> {
        self.lock().last_valid.clone()
    }

    /// Hand the last accepted delay to `sink` in nanoseconds
    ///
    /// Without an accepted measurement the sink is not called and the
    /// outcome reads "No recent measurement". The outcome is published as
    /// the last result either way; a failed outcome keeps the previous delay
    /// and correlation, and the accepted measurement is kept.
    pub fn apply_offset<S>(&self, sink: &mut S) -> MeasurementResult
    where
        S: OffsetSink + ?Sized,
    {
        let last_valid = self.lock().last_valid.clone();

        let result = match last_valid {
            None => {
                tracing::info!("No recent measurement to apply");
                MeasurementResult::no_recent_measurement()
            }
            Some(measured) => {
                let offset_ns = delay_ms_to_ns(measured.delay_ms);
                match sink.apply_sync_offset(offset_ns) {
                    Ok(()) => {
                        tracing::info!(offset_ns, delay_ms = measured.delay_ms, "Sync offset applied");
                        MeasurementResult::offset_applied(measured.delay_ms, measured.correlation)
                    }
                    Err(error) => {
                        tracing::warn!(offset_ns, %error, "Sync offset not applied");
                        MeasurementResult::offset_failed(&error)
                    }
                }
            }
        };

        let mut state = self.lock();
        let result = result.carry_numbers_from(&state.last_result);
        state.last_result = result.clone();
        result
    }

    /// Number of measurements started
    pub fn measurement_count(&self) -> u64 {
        self.measurements.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for DelayMeter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelayMeter")
            .field("sample_rate", &self.sample_rate)
            .field("measurements", &self.measurement_count())
            .finish_non_exhaustive()
    }
}
