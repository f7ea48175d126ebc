//! Resting-state baseline calibration
//!
//! A tracker lives exactly as long as one stream connection. It averages the
//! first `N` mu-power estimates and then freezes; a reconnection gets a new
//! tracker rather than a reset.

use tracing::info;

/// Calibration progress
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BaselineState {
    /// No estimate recorded yet
    Uninitialized,
    /// Estimates recorded so far, short of the target count
    Accumulating { collected: usize },
    /// Frozen reference mean
    Established { mean: f64 },
}

impl BaselineState {
    pub fn is_established(&self) -> bool {
        matches!(self, BaselineState::Established { .. })
    }

    /// The frozen mean, if calibration has finished
    pub fn mean(&self) -> Option<f64> {
        match self {
            BaselineState::Established { mean } => Some(*mean),
            _ => None,
        }
    }
}

/// Accumulates early estimates into a fixed reference mean
#[derive(Debug, Clone)]
pub struct BaselineTracker {
    target: usize,
    values: Vec<f64>,
    state: BaselineState,
}

impl BaselineTracker {
    /// `target` estimates are averaged (at least one)
    pub fn new(target: usize) -> Self {
        let target = target.max(1);
        BaselineTracker {
            target,
            values: Vec::with_capacity(target),
            state: BaselineState::Uninitialized,
        }
    }

    pub fn state(&self) -> BaselineState {
        self.state
    }

    pub fn target(&self) -> usize {
        self.target
    }

    /// Record one estimate; ignored once the baseline is established
    pub fn record(&mut self, value: f64) -> BaselineState {
        if self.state.is_established() {
            return self.state;
        }

        self.values.push(value);

        self.state = if self.values.len() >= self.target {
            let mean = self.values.iter().sum::<f64>() / self.values.len() as f64;
            self.values = Vec::new();
            info!(baseline = mean, samples = self.target, "baseline established");
            BaselineState::Established { mean }
        } else {
            BaselineState::Accumulating {
                collected: self.values.len(),
            }
        };

        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_progression() {
        let mut tracker = BaselineTracker::new(3);
        assert_eq!(tracker.state(), BaselineState::Uninitialized);

        assert_eq!(tracker.record(1.0), BaselineState::Accumulating { collected: 1 });
        assert_eq!(tracker.record(2.0), BaselineState::Accumulating { collected: 2 });
        assert_eq!(tracker.record(6.0), BaselineState::Established { mean: 3.0 });
    }

    #[test]
    fn test_established_is_frozen() {
        let mut tracker = BaselineTracker::new(2);
        tracker.record(4.0);
        tracker.record(4.0);

        for value in [100.0, 0.0, -5.0] {
            assert_eq!(tracker.record(value), BaselineState::Established { mean: 4.0 });
        }
        assert_eq!(tracker.state().mean(), Some(4.0));
    }

    #[test]
    fn test_zero_target_is_clamped() {
        let mut tracker = BaselineTracker::new(0);
        assert_eq!(tracker.target(), 1);
        assert!(tracker.record(2.5).is_established());
    }
}
