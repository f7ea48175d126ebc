//! Mu-rhythm processor: window management plus per-tick estimation
//!
//! One processor is created per stream connection. It owns the sliding
//! windows, the spectral estimator and the baseline tracker, so dropping it
//! discards all per-connection state.

use crate::baseline::{BaselineState, BaselineTracker};
use crate::buffer::WindowedBuffer;
use crate::config::{FeedbackConfig, FrequencyBand};
use crate::metrics::{laterality_index, mu_suppression, FeedbackMetrics};
use crate::spectral::SpectralEstimator;
use nfb_core::NfbResult;
use std::time::Instant;
use tracing::trace;

/// Result of one estimation tick
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessingOutcome {
    /// Window is below the estimation threshold
    Buffering { filled: usize, required: usize },
    /// Window was analyzed
    Ready(FeedbackMetrics),
}

pub struct MuRhythmProcessor {
    buffer: WindowedBuffer,
    estimator: SpectralEstimator,
    baseline: BaselineTracker,
    mu_band: FrequencyBand,
    beta_band: FrequencyBand,
}

impl MuRhythmProcessor {
    /// Build a processor for a stream sampled at `sample_rate` Hz
    pub fn new(config: &FeedbackConfig, sample_rate: f64) -> NfbResult<Self> {
        let estimator = SpectralEstimator::new(sample_rate)?;
        let buffer = WindowedBuffer::new(config.window_samples(sample_rate))?;

        Ok(MuRhythmProcessor {
            buffer,
            estimator,
            baseline: BaselineTracker::new(config.baseline_ticks()),
            mu_band: config.mu_band,
            beta_band: config.beta_band,
        })
    }

    /// Window capacity in samples
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    pub fn sample_rate(&self) -> f64 {
        self.estimator.sample_rate()
    }

    pub fn baseline(&self) -> BaselineState {
        self.baseline.state()
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Append one reading of the left (C3) and right (C4) channels
    pub fn push(&mut self, left: f64, right: f64) {
        self.buffer.append(left, right);
    }

    /// Estimate band powers over the current window.
    ///
    /// Each ready tick contributes its mean mu power to the baseline until the
    /// baseline is established; the tick that completes it already reports
    /// suppression against the new baseline.
    pub fn update(&mut self) -> NfbResult<ProcessingOutcome> {
        if !self.buffer.is_sufficient() {
            return Ok(ProcessingOutcome::Buffering {
                filled: self.buffer.len(),
                required: self.buffer.threshold(),
            });
        }

        let start = Instant::now();

        let left = self.estimator.welch_psd(&self.buffer.left().to_vec())?;
        let right = self.estimator.welch_psd(&self.buffer.right().to_vec())?;

        let left_mu = left.mean_in_band(self.mu_band);
        let right_mu = right.mean_in_band(self.mu_band);
        let current_mu = (left_mu.value() + right_mu.value()) / 2.0;

        let baseline = self.baseline.record(current_mu);

        let metrics = FeedbackMetrics {
            left_mu,
            left_beta: left.mean_in_band(self.beta_band),
            right_mu,
            right_beta: right.mean_in_band(self.beta_band),
            laterality_index: laterality_index(left_mu, right_mu),
            mu_suppression: mu_suppression(current_mu, baseline),
            baseline,
        };

        trace!(
            elapsed_us = start.elapsed().as_micros() as u64,
            samples = self.buffer.len(),
            mean_mu = metrics.mean_mu(),
            "window analyzed"
        );

        Ok(ProcessingOutcome::Ready(metrics))
    }
}
