//! Fixed-capacity sample storage for the reference and target channels
//!
//! Each channel keeps the most recent [`BUFFER_SECONDS`](crate::BUFFER_SECONDS)
//! of audio. Frames are written one at a time; once full, every new frame
//! evicts the oldest one, so an append never fails and never drops input.
//!
//! The storage itself is not synchronized. [`DelayMeter`](crate::DelayMeter)
//! keeps the [`ChannelPair`] behind its single lock.

use ringbuf::traits::{Consumer, Observer, RingBuffer};
use ringbuf::HeapRb;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which side of the comparison a block of frames belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// The stream the offset is measured against
    Reference,
    /// The stream whose delay is being measured
    Target,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Reference => f.write_str("reference"),
            Channel::Target => f.write_str("target"),
        }
    }
}

/// Circular buffer holding the most recent `capacity` samples of one channel
pub struct SampleRing {
    /// Overwriting ring storage, oldest sample first
    rb: HeapRb<f32>,
    /// Total frames ever written (drives the write cursor)
    written: u64,
}

impl SampleRing {
    /// Create a ring holding up to `capacity` samples
    ///
    /// A zero capacity is raised to one sample.
    pub fn new(capacity: usize) -> Self {
        Self {
            rb: HeapRb::new(capacity.max(1)),
            written: 0,
        }
    }

    /// Append frames in order, evicting the oldest samples once full
    ///
    /// # Example
    /// ```
    /// use delaymeter_core::SampleRing;
    ///
    /// let mut ring = SampleRing::new(4);
    /// ring.append(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    /// assert_eq!(ring.len(), 4);
    /// assert_eq!(ring.snapshot_window(4), Some(vec![3.0, 4.0, 5.0, 6.0]));
    /// ```
    pub fn append(&mut self, samples: &[f32]) {
        for &sample in samples {
            let _ = self.rb.push_overwrite(sample);
        }
        self.written += samples.len() as u64;
    }

    /// Number of valid samples (saturates at capacity)
    pub fn len(&self) -> usize {
        self.rb.occupied_len()
    }

    /// True if nothing has been written since creation or the last reset
    pub fn is_empty(&self) -> bool {
        self.rb.is_empty()
    }

    /// Maximum number of samples retained
    pub fn capacity(&self) -> usize {
        self.rb.capacity().get()
    }

    /// Index the next sample will be written to, always in `[0, capacity)`
    pub fn write_cursor(&self) -> usize {
        (self.written % self.capacity() as u64) as usize
    }

    /// Total frames appended since creation or the last reset
    pub fn frames_written(&self) -> u64 {
        self.written
    }

    /// Copy the most recent `frames` samples, oldest first
    ///
    /// Returns `None` if fewer than `frames` samples are buffered.
    pub fn snapshot_window(&self, frames: usize) -> Option<Vec<f32>> {
        let mut out = Vec::with_capacity(frames.min(self.len()));
        self.extend_recent(frames, &mut out).then_some(out)
    }

    /// Append the most recent `frames` samples to `out`, oldest first
    ///
    /// Leaves `out` untouched and returns false if fewer than `frames`
    /// samples are buffered.
    pub fn extend_recent(&self, frames: usize, out: &mut Vec<f32>) -> bool {
        let available = self.len();
        if frames > available {
            return false;
        }

        let skip = available - frames;
        let (head, tail) = self.rb.as_slices();
        if skip < head.len() {
            out.extend_from_slice(&head[skip..]);
            out.extend_from_slice(tail);
        } else {
            out.extend_from_slice(&tail[skip - head.len()..]);
        }
        true
    }

    /// Discard all buffered samples
    pub fn reset(&mut self) {
        self.rb.clear();
        self.written = 0;
    }
}

impl fmt::Debug for SampleRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleRing")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .field("write_cursor", &self.write_cursor())
            .finish()
    }
}

/// Reference and target rings sharing one capacity and sample rate
#[derive(Debug)]
pub struct ChannelPair {
    reference: SampleRing,
    target: SampleRing,
    sample_rate: u32,
}

impl ChannelPair {
    /// Create both rings sized for [`BUFFER_SECONDS`](crate::BUFFER_SECONDS) at `sample_rate`
    ///
    /// # Example
    /// ```
    /// use delaymeter_core::{Channel, ChannelPair};
    ///
    /// let pair = ChannelPair::new(48000);
    /// assert_eq!(pair.capacity(), 240000); // 5 seconds
    /// assert_eq!(pair.ring(Channel::Target).len(), 0);
    /// ```
    pub fn new(sample_rate: u32) -> Self {
        let capacity = crate::ms_to_samples(crate::BUFFER_SECONDS * 1000, sample_rate);
        Self {
            reference: SampleRing::new(capacity),
            target: SampleRing::new(capacity),
            sample_rate,
        }
    }

    /// Append frames to one channel
    pub fn append(&mut self, channel: Channel, samples: &[f32]) {
        self.ring_mut(channel).append(samples);
    }

    /// Borrow one channel's ring
    pub fn ring(&self, channel: Channel) -> &SampleRing {
        match channel {
            Channel::Reference => &self.reference,
            Channel::Target => &self.target,
        }
    }

    fn ring_mut(&mut self, channel: Channel) -> &mut SampleRing {
        match channel {
            Channel::Reference => &mut self.reference,
            Channel::Target => &mut self.target,
        }
    }

    /// Samples available in both channels
    pub fn available(&self) -> usize {
        self.reference.len().min(self.target.len())
    }

    /// Shared per-channel capacity
    pub fn capacity(&self) -> usize {
        self.reference.capacity()
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Discard one channel's buffered samples
    pub fn reset(&mut self, channel: Channel) {
        self.ring_mut(channel).reset();
    }
}
