//! Bounded-lag normalized cross-correlation
//!
//! Searches every integer lag in `[-max_lag, +max_lag]` and computes the
//! Pearson correlation of the mean-centered signals over the overlapping
//! region:
//!
//! ```text
//! corr(lag) = Σ(a - ā)(b - b̄) / sqrt(Σ(a - ā)² · Σ(b - b̄)²)
//! ```
//!
//! A positive lag means the target is delayed relative to the reference:
//! the reference is read from index 0 and the target from index `lag`. For a
//! negative lag the reference starts at `|lag|` and the target at 0.
//!
//! This is a direct O(frames × lag range) search. Lag resolution is one sample.

use super::snapshot::Snapshot;
use crate::error::MeasureError;
use crate::{ms_to_samples, MIN_CORRELATION, MIN_OVERLAP_FRAMES};

/// Lags whose denominator falls below this are skipped
const DENOMINATOR_EPSILON: f64 = 1e-8;

/// Outcome of a successful delay search
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelayEstimate {
    /// Best lag in samples (positive: target lags reference)
    pub lag_samples: i64,
    /// Best lag in milliseconds
    pub delay_ms: f64,
    /// Normalized correlation at the best lag, in [-1, 1]
    pub correlation: f64,
    /// Frames per channel that were analysed
    pub frames: usize,
    /// Largest lag searched, after clamping
    pub max_lag: usize,
    /// Number of lags that passed the overlap and denominator checks
    pub lags_evaluated: usize,
}

/// Best lag found by a scan, before the acceptance threshold is applied
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LagPeak {
    pub lag: i64,
    pub correlation: f64,
    pub lags_evaluated: usize,
}

/// Search limit in samples for a window of `frames`
///
/// `max_lag_ms` at `sample_rate`, clamped to `frames / 2` so every tested lag
/// keeps at least half the window as overlap.
pub fn max_lag_samples(frames: usize, sample_rate: u32, max_lag_ms: u32) -> usize {
    ms_to_samples(max_lag_ms, sample_rate).min(frames / 2)
}

/// Estimate the delay of the target relative to the reference
///
/// `snapshot` is expected to be conditioned already. `sample_rate` must be
/// non-zero. Fails with [`MeasureError::InsufficientCorrelation`] if the best
/// correlation is below [`MIN_CORRELATION`] or no lag could be evaluated.
///
/// # Example
/// ```
/// use delaymeter_core::{estimate_delay, NoiseGenerator, Snapshot};
///
/// let source = NoiseGenerator::new(3).take(8192 + 48);
/// let reference = source[48..].to_vec();
/// let target = source[..8192].to_vec(); // delayed by 48 samples
///
/// let mut snapshot = Snapshot::new(reference, target).unwrap();
/// snapshot.condition();
///
/// let estimate = estimate_delay(&snapshot, 48000, 50).unwrap();
/// assert_eq!(estimate.lag_samples, 48);
/// assert!((estimate.delay_ms - 1.0).abs() < 1e-9);
/// ```
pub fn estimate_delay(
    snapshot: &Snapshot,
    sample_rate: u32,
    max_lag_ms: u32,
) -> Result<DelayEstimate, MeasureError> {
    let frames = snapshot.len();
    if frames < MIN_OVERLAP_FRAMES {
        return Err(MeasureError::InsufficientAudio {
            reference: frames,
            target: frames,
        });
    }

    let max_lag = max_lag_samples(frames, sample_rate, max_lag_ms);
    let peak = scan_lags(snapshot.reference(), snapshot.target(), max_lag);

    tracing::trace!(
        frames,
        max_lag,
        peak = ?peak,
        "lag_scan_complete"
    );

    let peak = match peak {
        Some(peak) if peak.correlation >= MIN_CORRELATION => peak,
        Some(peak) => {
            return Err(MeasureError::InsufficientCorrelation {
                best: Some(peak.correlation),
            })
        }
        None => return Err(MeasureError::InsufficientCorrelation { best: None }),
    };

    Ok(DelayEstimate {
        lag_samples: peak.lag,
        delay_ms: peak.lag as f64 * 1000.0 / sample_rate as f64,
        correlation: peak.correlation,
        frames,
        max_lag,
        lags_evaluated: peak.lags_evaluated,
    })
}

/// Find the lag of maximum correlation in `[-max_lag, +max_lag]`
///
/// Lags are scanned in ascending order and the best is replaced only on a
/// strict improvement, so exact ties keep the lowest lag. Lags with an
/// overlap below [`MIN_OVERLAP_FRAMES`] or a near-zero denominator are
/// skipped. Returns `None` if no lag was evaluated.
///
/// Both slices must have the same length.
pub fn scan_lags(reference: &[f32], target: &[f32], max_lag: usize) -> Option<LagPeak> {
    let frames = reference.len().min(target.len());
    if frames == 0 {
        return None;
    }

    let reference = &reference[..frames];
    let target = &target[..frames];
    let reference_mean = mean(reference);
    let target_mean = mean(target);

    tracing::trace!(reference_mean, target_mean, "channel_means");

    let max_lag = max_lag.min(frames - 1) as i64;
    let mut best: Option<(i64, f64)> = None;
    let mut lags_evaluated = 0usize;

    for lag in -max_lag..=max_lag {
        let abs_lag = lag.unsigned_abs() as usize;
        let overlap = frames - abs_lag;
        if overlap < MIN_OVERLAP_FRAMES {
            continue;
        }

        let (start_a, start_b) = if lag >= 0 { (0, abs_lag) } else { (abs_lag, 0) };
        let a = &reference[start_a..start_a + overlap];
        let b = &target[start_b..start_b + overlap];

        let Some(corr) = centered_correlation(a, b, reference_mean, target_mean) else {
            continue;
        };
        lags_evaluated += 1;

        if best.map_or(true, |(_, best_corr)| corr > best_corr) {
            best = Some((lag, corr));
        }
    }

    best.map(|(lag, correlation)| LagPeak {
        lag,
        correlation,
        lags_evaluated,
    })
}

/// Pearson correlation of `a` and `b` around the given means
///
/// Returns `None` when the denominator is below the degeneracy guard.
fn centered_correlation(a: &[f32], b: &[f32], mean_a: f64, mean_b: f64) -> Option<f64> {
    let mut sum_ab = 0.0f64;
    let mut sum_a2 = 0.0f64;
    let mut sum_b2 = 0.0f64;

    for (&x, &y) in a.iter().zip(b) {
        let da = x as f64 - mean_a;
        let db = y as f64 - mean_b;
        sum_ab += da * db;
        sum_a2 += da * da;
        sum_b2 += db * db;
    }

    let denom = (sum_a2 * sum_b2).sqrt();
    if denom < DENOMINATOR_EPSILON {
        return None;
    }
    Some(sum_ab / denom)
}

fn mean(data: &[f32]) -> f64 {
    data.iter().map(|&x| x as f64).sum::<f64>() / data.len() as f64
}
