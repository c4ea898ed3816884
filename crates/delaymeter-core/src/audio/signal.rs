//! Deterministic band-limited noise
//!
//! Program-like test material for the simulator, benches and tests. White
//! noise from a linear congruential generator is passed through a one-pole
//! low-pass, which gives a broadband signal with a single sharp
//! autocorrelation peak. Two generators built with the same seed produce the
//! same sequence, so a delayed copy is just a second generator started later.

/// Default generator seed
const DEFAULT_SEED: u32 = 0xDEADBEEF;

/// Default amplitude (-6dB for headroom)
const DEFAULT_AMPLITUDE: f32 = 0.5;

/// Default one-pole smoothing coefficient
const DEFAULT_SMOOTHING: f32 = 0.5;

/// Seeded band-limited noise generator
///
/// # Example
/// ```
/// use delaymeter_core::NoiseGenerator;
///
/// let a = NoiseGenerator::new(7).take(256);
/// let b = NoiseGenerator::new(7).take(256);
/// assert_eq!(a, b);
/// ```
#[derive(Debug, Clone)]
pub struct NoiseGenerator {
    /// LCG state
    seed: u32,
    /// Seed used at construction, restored by `reset`
    initial_seed: u32,
    /// One-pole low-pass state
    state: f32,
    /// Low-pass coefficient in [0, 1); 0 yields white noise
    smoothing: f32,
    /// Output scaling factor
    amplitude: f32,
}

impl NoiseGenerator {
    /// Create a generator with the given seed
    pub fn new(seed: u32) -> Self {
        Self {
            seed,
            initial_seed: seed,
            state: 0.0,
            smoothing: DEFAULT_SMOOTHING,
            amplitude: DEFAULT_AMPLITUDE,
        }
    }

    /// Set the low-pass coefficient (clamped to `0.0..=0.99`)
    pub fn with_smoothing(mut self, smoothing: f32) -> Self {
        self.smoothing = smoothing.clamp(0.0, 0.99);
        self
    }

    /// Set the output amplitude (clamped to `0.0..=1.0`)
    pub fn with_amplitude(mut self, amplitude: f32) -> Self {
        self.amplitude = amplitude.clamp(0.0, 1.0);
        self
    }

    /// Next white sample in -1.0..1.0
    fn white(&mut self) -> f32 {
        // LCG parameters (same as glibc)
        self.seed = self.seed.wrapping_mul(1103515245).wrapping_add(12345);
        let bits = (self.seed >> 16) & 0x7FFF;
        (bits as f32 / 16384.0) - 1.0
    }

    /// Next band-limited sample
    pub fn next_sample(&mut self) -> f32 {
        let white = self.white();
        self.state = self.smoothing * self.state + (1.0 - self.smoothing) * white;
        self.state * self.amplitude
    }

    /// Fill a buffer with sequential samples
    pub fn fill_buffer(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.next_sample();
        }
    }

    /// Generate the next `count` samples
    pub fn take(&mut self, count: usize) -> Vec<f32> {
        (0..count).map(|_| self.next_sample()).collect()
    }

    /// Restart the sequence from the construction seed
    pub fn reset(&mut self) {
        self.seed = self.initial_seed;
        self.state = 0.0;
    }
}

impl Default for NoiseGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}
