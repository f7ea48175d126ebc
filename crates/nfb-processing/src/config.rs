//! Configuration management for the feedback engine
//!
//! One immutable [`FeedbackConfig`] is built at startup and threaded into the
//! processor and the processing loop. It is read from the session file shared
//! with the stimulus front end, so unknown keys are ignored.

use nfb_core::{config_error, NfbError, NfbResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Frequency interval, inclusive at both ends
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencyBand {
    pub low_hz: f64,
    pub high_hz: f64,
}

impl FrequencyBand {
    pub const fn new(low_hz: f64, high_hz: f64) -> Self {
        FrequencyBand { low_hz, high_hz }
    }

    /// Sensorimotor mu rhythm
    pub const MU: FrequencyBand = FrequencyBand::new(8.0, 13.0);

    /// Beta rhythm
    pub const BETA: FrequencyBand = FrequencyBand::new(13.0, 30.0);

    /// Whether a bin center frequency lies inside the band
    pub fn contains(&self, frequency: f64) -> bool {
        frequency >= self.low_hz && frequency <= self.high_hz
    }

    fn validate(&self, name: &str) -> NfbResult<()> {
        if !(self.low_hz.is_finite() && self.high_hz.is_finite()) {
            return Err(config_error!("{} band must be finite", name));
        }
        if self.low_hz < 0.0 || self.low_hz > self.high_hz {
            return Err(config_error!(
                "{} band [{}, {}] Hz is inverted or negative",
                name,
                self.low_hz,
                self.high_hz
            ));
        }
        Ok(())
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackConfig {
    /// Sampling rate used for spectral estimation; falls back to the
    /// stream's nominal rate when unset
    pub sample_rate: Option<f64>,
    /// Sliding window length in seconds
    pub window_secs: f64,
    /// Publish/update period in seconds
    pub update_interval_secs: f64,
    /// Length of the baseline calibration period in seconds
    pub baseline_duration_secs: f64,
    /// Upper bound on a single discovery attempt in seconds
    pub discovery_timeout_secs: f64,
    /// Pause between failed discovery attempts in seconds
    pub retry_interval_secs: f64,
    pub mu_band: FrequencyBand,
    pub beta_band: FrequencyBand,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            sample_rate: None,
            window_secs: 1.0,
            update_interval_secs: 0.25,
            baseline_duration_secs: 5.0,
            discovery_timeout_secs: 3.0,
            retry_interval_secs: 2.0,
            mu_band: FrequencyBand::MU,
            beta_band: FrequencyBand::BETA,
        }
    }
}

/// Subset of the session file the engine cares about
#[derive(Debug, Deserialize)]
struct SessionFile {
    device_frequency: Option<f64>,
    #[serde(default)]
    feedback: Option<FeedbackConfig>,
}

impl FeedbackConfig {
    /// Parse a session JSON document.
    ///
    /// `device_frequency` seeds the sample rate; an optional `feedback` object
    /// overrides any field (including the sample rate).
    pub fn from_session_json(json: &str) -> NfbResult<Self> {
        let session: SessionFile = serde_json::from_str(json)
            .map_err(|e| NfbError::config(format!("malformed session file: {}", e)))?;

        let mut config = session.feedback.unwrap_or_default();
        if config.sample_rate.is_none() {
            config.sample_rate = session.device_frequency;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load and validate a session file from disk
    pub fn from_session_file(path: impl AsRef<Path>) -> NfbResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| NfbError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_session_json(&json)
    }

    /// Validate ranges and consistency
    pub fn validate(&self) -> NfbResult<()> {
        if let Some(rate) = self.sample_rate {
            if !(rate.is_finite() && rate > 0.0) {
                return Err(config_error!("sample rate must be positive, got {}", rate));
            }
        }

        let positive = [
            ("window_secs", self.window_secs),
            ("update_interval_secs", self.update_interval_secs),
            ("baseline_duration_secs", self.baseline_duration_secs),
            ("discovery_timeout_secs", self.discovery_timeout_secs),
            ("retry_interval_secs", self.retry_interval_secs),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(config_error!("{} must be positive, got {}", name, value));
            }
        }

        self.mu_band.validate("mu")?;
        self.beta_band.validate("beta")?;
        Ok(())
    }

    /// Rate used for spectral estimation on a stream with the given nominal rate
    pub fn effective_sample_rate(&self, nominal_srate: f64) -> f64 {
        self.sample_rate.unwrap_or(nominal_srate)
    }

    /// Window capacity in samples: `round(sample_rate * window_secs)`
    pub fn window_samples(&self, sample_rate: f64) -> usize {
        (sample_rate * self.window_secs).round().max(0.0) as usize
    }

    /// Number of estimation ticks averaged into the baseline
    pub fn baseline_ticks(&self) -> usize {
        let ticks = (self.baseline_duration_secs / self.update_interval_secs).ceil();
        (ticks as usize).max(1)
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs_f64(self.update_interval_secs)
    }

    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.discovery_timeout_secs)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs_f64(self.retry_interval_secs)
    }
}
