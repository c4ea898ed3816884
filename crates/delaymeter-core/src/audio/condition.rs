//! Signal conditioning applied before correlation
//!
//! Pre-emphasis suppresses DC and slowly varying content so transients
//! dominate the correlation peak. The Hann taper removes the hard edges of
//! the finite window. Both run in place and are applied identically to the
//! reference and target arrays.

use crate::PRE_EMPHASIS_ALPHA;
use std::f64::consts::PI;

/// First-order pre-emphasis: `y[0] = x[0]`, `y[i] = x[i] - α·x[i-1]`
///
/// No-op for fewer than two samples.
///
/// # Example
/// ```
/// use delaymeter_core::audio::condition::apply_pre_emphasis;
///
/// let mut data = [1.0f32; 4];
/// apply_pre_emphasis(&mut data);
/// assert_eq!(data[0], 1.0);
/// assert!((data[1] - 0.05).abs() < 1e-6);
/// ```
pub fn apply_pre_emphasis(data: &mut [f32]) {
    if data.len() < 2 {
        return;
    }

    let mut prev = data[0];
    for sample in data.iter_mut().skip(1) {
        let current = *sample;
        *sample = current - PRE_EMPHASIS_ALPHA * prev;
        prev = current;
    }
}

/// Hann coefficient for index `i` of an `n`-point window (`n > 1`)
#[inline]
pub fn hann_coefficient(i: usize, n: usize) -> f64 {
    let phase = i as f64 / (n - 1) as f64;
    0.5 * (1.0 - (2.0 * PI * phase).cos())
}

/// Multiply by a symmetric Hann window, tapering both ends to zero
///
/// No-op for one sample or fewer.
pub fn apply_hann_window(data: &mut [f32]) {
    let n = data.len();
    if n <= 1 {
        return;
    }

    for (i, sample) in data.iter_mut().enumerate() {
        *sample *= hann_coefficient(i, n) as f32;
    }
}

/// Pre-emphasis followed by the Hann taper
pub fn condition(data: &mut [f32]) {
    apply_pre_emphasis(data);
    apply_hann_window(data);
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_pre_emphasis_constant_input() {
        let mut data = [1.0f32; 10];
        apply_pre_emphasis(&mut data);

        assert_eq!(data[0], 1.0);
        for &y in &data[1..] {
            assert_relative_eq!(y, 1.0 - PRE_EMPHASIS_ALPHA, epsilon = 1e-7);
            assert_relative_eq!(y, 0.05, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_pre_emphasis_uses_original_previous_sample() {
        let mut data = [1.0f32, 2.0, 4.0];
        apply_pre_emphasis(&mut data);
        assert_relative_eq!(data[1], 2.0 - 0.95, epsilon = 1e-6);
        assert_relative_eq!(data[2], 4.0 - 0.95 * 2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_pre_emphasis_short_input_untouched() {
        let mut single = [0.7f32];
        apply_pre_emphasis(&mut single);
        assert_eq!(single, [0.7]);

        let mut empty: [f32; 0] = [];
        apply_pre_emphasis(&mut empty);
    }

    #[test]
    fn test_hann_endpoints_are_zero() {
        for n in [2usize, 3, 16, 1023, 1024] {
            let mut data = vec![1.0f32; n];
            apply_hann_window(&mut data);
            assert_eq!(data[0], 0.0, "first sample, n={}", n);
            assert_eq!(data[n - 1], 0.0, "last sample, n={}", n);
        }
    }

    #[test]
    fn test_hann_midpoint_is_one_for_odd_length() {
        for n in [3usize, 5, 101, 4097] {
            let mut data = vec![1.0f32; n];
            apply_hann_window(&mut data);
            assert_eq!(data[n / 2], 1.0, "midpoint, n={}", n);
        }
    }

    #[test]
    fn test_hann_is_symmetric() {
        let n = 257;
        for i in 0..n / 2 {
            assert_relative_eq!(
                hann_coefficient(i, n),
                hann_coefficient(n - 1 - i, n),
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn test_hann_single_sample_untouched() {
        let mut data = [0.3f32];
        apply_hann_window(&mut data);
        assert_eq!(data, [0.3]);
    }

    #[test]
    fn test_condition_is_deterministic() {
        let input: Vec<f32> = (0..2048).map(|i| ((i * 37) % 101) as f32 / 50.0 - 1.0).collect();
        let mut a = input.clone();
        let mut b = input;
        condition(&mut a);
        condition(&mut b);
        assert_eq!(a, b);
    }
}
