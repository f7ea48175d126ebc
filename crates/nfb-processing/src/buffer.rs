//! Fixed-capacity sliding windows for the two monitored channels

use nfb_core::{NfbError, NfbResult};
use std::collections::VecDeque;

/// Ring buffer holding the most recent `capacity` samples of one channel
#[derive(Debug, Clone)]
pub struct ChannelBuffer {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl ChannelBuffer {
    pub fn new(capacity: usize) -> Self {
        ChannelBuffer {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest one once full
    pub fn append(&mut self, sample: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Contiguous copy of the window, oldest sample first
    pub fn to_vec(&self) -> Vec<f64> {
        self.samples.iter().copied().collect()
    }
}

/// The left (C3) and right (C4) windows, filled in lock-step
#[derive(Debug, Clone)]
pub struct WindowedBuffer {
    left: ChannelBuffer,
    right: ChannelBuffer,
}

impl WindowedBuffer {
    /// Create a buffer pair; windows below 2 samples cannot carry a spectrum
    pub fn new(capacity: usize) -> NfbResult<Self> {
        if capacity < 2 {
            return Err(NfbError::config(format!(
                "window of {} samples is too short for spectral estimation",
                capacity
            )));
        }

        Ok(WindowedBuffer {
            left: ChannelBuffer::new(capacity),
            right: ChannelBuffer::new(capacity),
        })
    }

    /// Append one reading of each monitored channel
    pub fn append(&mut self, left: f64, right: f64) {
        self.left.append(left);
        self.right.append(right);
    }

    /// Samples currently held per channel
    pub fn len(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.left.capacity()
    }

    /// Minimum occupancy for a stable spectral estimate
    pub fn threshold(&self) -> usize {
        self.capacity() / 2
    }

    /// True once at least half the window is filled
    pub fn is_sufficient(&self) -> bool {
        self.len() >= self.threshold()
    }

    pub fn left(&self) -> &ChannelBuffer {
        &self.left
    }

    pub fn right(&self) -> &ChannelBuffer {
        &self.right
    }
}
