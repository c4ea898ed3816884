//! Extraction of the analysis window from both channels
//!
//! [`capture_recent`] is the only step of a measurement that runs under the
//! meter lock. It sizes the window, allocates the two working arrays and bulk
//! copies the most recent samples of each channel. Everything after that
//! works on the private [`Snapshot`].

use super::condition;
use super::ring::{Channel, ChannelPair};
use crate::error::MeasureError;
use crate::{ms_to_samples, MIN_OVERLAP_FRAMES};

/// Equal-length reference/target sample arrays taken at one instant
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    reference: Vec<f32>,
    target: Vec<f32>,
}

impl Snapshot {
    /// Build a snapshot from two arrays of equal length
    ///
    /// Returns `None` if the lengths differ.
    pub fn new(reference: Vec<f32>, target: Vec<f32>) -> Option<Self> {
        (reference.len() == target.len()).then_some(Self { reference, target })
    }

    /// Frames per channel
    pub fn len(&self) -> usize {
        self.reference.len()
    }

    /// True if the snapshot holds no frames
    pub fn is_empty(&self) -> bool {
        self.reference.is_empty()
    }

    /// Reference samples, oldest first
    pub fn reference(&self) -> &[f32] {
        &self.reference
    }

    /// Target samples, oldest first
    pub fn target(&self) -> &[f32] {
        &self.target
    }

    /// Apply pre-emphasis and the Hann taper to both channels
    pub fn condition(&mut self) {
        condition::condition(&mut self.reference);
        condition::condition(&mut self.target);
    }

    /// Exchange the roles of reference and target
    pub fn swapped(self) -> Self {
        Self {
            reference: self.target,
            target: self.reference,
        }
    }

    /// Consume the snapshot, returning `(reference, target)`
    pub fn into_parts(self) -> (Vec<f32>, Vec<f32>) {
        (self.reference, self.target)
    }
}

/// Number of frames a measurement would analyse right now
///
/// `min(available in both channels, window)` where the window is
/// `window_ms` at the pair's sample rate.
pub fn window_frames(pair: &ChannelPair, window_ms: u32) -> usize {
    pair.available()
        .min(ms_to_samples(window_ms, pair.sample_rate()))
}

/// Copy the most recent analysis window out of both rings
///
/// Fails with [`MeasureError::InsufficientAudio`] if fewer than
/// [`MIN_OVERLAP_FRAMES`] frames would be analysed, and with
/// [`MeasureError::AllocationFailed`] if the working arrays cannot be
/// allocated. Neither failure touches the rings.
pub fn capture_recent(pair: &ChannelPair, window_ms: u32) -> Result<Snapshot, MeasureError> {
    let frames = window_frames(pair, window_ms);
    if frames < MIN_OVERLAP_FRAMES {
        return Err(MeasureError::InsufficientAudio {
            reference: pair.ring(Channel::Reference).len(),
            target: pair.ring(Channel::Target).len(),
        });
    }

    let mut reference = working_array(frames)?;
    let mut target = working_array(frames)?;

    // Both rings hold at least `frames` samples, checked above
    let copied = pair
        .ring(Channel::Reference)
        .extend_recent(frames, &mut reference)
        && pair.ring(Channel::Target).extend_recent(frames, &mut target);
    if !copied {
        return Err(MeasureError::InsufficientAudio {
            reference: pair.ring(Channel::Reference).len(),
            target: pair.ring(Channel::Target).len(),
        });
    }

    Ok(Snapshot { reference, target })
}

fn working_array(frames: usize) -> Result<Vec<f32>, MeasureError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(frames)
        .map_err(|_| MeasureError::AllocationFailed { frames })?;
    Ok(buf)
}
