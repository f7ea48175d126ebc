//! NFB-Processing: Spectral analysis for mu-rhythm neurofeedback
//!
//! Windowed buffering, Welch band-power estimation, baseline calibration and
//! the derived laterality / suppression metrics.

pub mod baseline;
pub mod buffer;
pub mod config;
pub mod metrics;
pub mod processor;
pub mod spectral;

pub use baseline::{BaselineState, BaselineTracker};
pub use buffer::{ChannelBuffer, WindowedBuffer};
pub use config::{FeedbackConfig, FrequencyBand};
pub use metrics::{laterality_index, mu_suppression, FeedbackMetrics};
pub use processor::{MuRhythmProcessor, ProcessingOutcome};
pub use spectral::{BandPower, SpectralEstimator};
