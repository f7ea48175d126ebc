//! SampleFrame: one multiplexed reading across all stream channels

use crate::error::{NfbError, NfbResult};

/// One timestamped reading, one value per stream channel
///
/// Frames are consumed immediately by the windowed buffer and never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleFrame {
    /// Source timestamp in seconds (clock-synchronized where the backend supports it)
    pub timestamp: f64,
    /// Per-channel readings in stream order
    pub values: Vec<f64>,
}

impl SampleFrame {
    /// Create a new frame
    pub fn new(timestamp: f64, values: Vec<f64>) -> Self {
        SampleFrame { timestamp, values }
    }

    /// Number of channels carried by this frame
    pub fn channel_count(&self) -> usize {
        self.values.len()
    }

    /// Reading of a single channel
    pub fn channel(&self, index: usize) -> NfbResult<f64> {
        self.values.get(index).copied().ok_or_else(|| NfbError::InvalidStream {
            stream: String::new(),
            reason: format!(
                "channel index {} out of bounds for frame with {} channels",
                index,
                self.values.len()
            ),
        })
    }

    /// Split an interleaved buffer (`[ch0, ch1, ..., ch0, ch1, ...]`) into frames
    pub fn from_interleaved(
        data: &[f64],
        channel_count: usize,
        timestamps: &[f64],
    ) -> NfbResult<Vec<SampleFrame>> {
        if channel_count == 0 {
            return Err(NfbError::InvalidStream {
                stream: String::new(),
                reason: "interleaved data with zero channels".to_string(),
            });
        }
        if data.len() % channel_count != 0 || data.len() / channel_count != timestamps.len() {
            return Err(NfbError::InvalidStream {
                stream: String::new(),
                reason: format!(
                    "{} values cannot be split into {} frames of {} channels",
                    data.len(),
                    timestamps.len(),
                    channel_count
                ),
            });
        }

        Ok(data
            .chunks_exact(channel_count)
            .zip(timestamps)
            .map(|(values, &timestamp)| SampleFrame::new(timestamp, values.to_vec()))
            .collect())
    }
}
