//! Derived feedback metrics

use crate::baseline::BaselineState;
use crate::spectral::BandPower;
use nfb_core::{ChannelPowers, FeedbackChannels};

/// Signed asymmetry `(right - left) / (right + left)`, zero when both are zero
pub fn laterality_index(left: BandPower, right: BandPower) -> f64 {
    let denominator = right.value() + left.value();
    if denominator > 0.0 {
        (right.value() - left.value()) / denominator
    } else {
        0.0
    }
}

/// `clamp(1 - current / baseline, 0, 1)` once a positive baseline exists, else 0
pub fn mu_suppression(current: f64, baseline: BaselineState) -> f64 {
    match baseline.mean() {
        Some(mean) if mean > 0.0 => (1.0 - current / mean).clamp(0.0, 1.0),
        _ => 0.0,
    }
}

/// Everything computed on one estimation tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeedbackMetrics {
    pub left_mu: BandPower,
    pub left_beta: BandPower,
    pub right_mu: BandPower,
    pub right_beta: BandPower,
    pub laterality_index: f64,
    pub mu_suppression: f64,
    pub baseline: BaselineState,
}

impl FeedbackMetrics {
    /// Mean mu power over both monitored channels
    pub fn mean_mu(&self) -> f64 {
        (self.left_mu.value() + self.right_mu.value()) / 2.0
    }

    /// Snapshot section keyed by electrode (left = C3, right = C4)
    pub fn channels(&self) -> FeedbackChannels {
        FeedbackChannels {
            c3: ChannelPowers::new(self.left_mu.value(), self.left_beta.value()),
            c4: ChannelPowers::new(self.right_mu.value(), self.right_beta.value()),
        }
    }
}
