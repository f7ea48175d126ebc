//! EEG signal simulator with sensorimotor mu-rhythm modulation

use crate::signal_patterns::MuPattern;
use nfb_core::{NfbError, NfbResult, SampleFrame, StreamDescriptor};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Labels of the two motor channels whose mu rhythm follows the pattern
pub const MOTOR_LABELS: [&str; 2] = ["C3", "C4"];

/// Configuration for EEG simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EegConfig {
    /// Sampling rate in Hz
    pub sampling_rate: f64,
    /// One label per channel, in stream order
    pub channel_labels: Vec<String>,
    /// Mu rhythm frequency in Hz
    pub mu_frequency: f64,
    /// Resting mu amplitude
    pub mu_amplitude: f64,
    /// Beta rhythm frequency in Hz
    pub beta_frequency: f64,
    /// Beta amplitude (unmodulated)
    pub beta_amplitude: f64,
    /// Gaussian noise standard deviation (0.0 = exact sinusoids)
    pub noise_std: f64,
    /// Mu gain schedule for the motor channels
    pub pattern: MuPattern,
    /// Random seed for reproducibility
    pub seed: Option<u64>,
}

impl Default for EegConfig {
    fn default() -> Self {
        Self {
            sampling_rate: 250.0,
            channel_labels: ["Fz", "C3", "Cz", "C4", "Pz", "PO7", "Oz", "PO8"]
                .iter()
                .map(|l| l.to_string())
                .collect(),
            mu_frequency: 10.0,
            mu_amplitude: 10.0,
            beta_frequency: 20.0,
            beta_amplitude: 3.0,
            noise_std: 1.0,
            pattern: MuPattern::default(),
            seed: None,
        }
    }
}

impl EegConfig {
    fn validate(&self) -> NfbResult<()> {
        if !(self.sampling_rate.is_finite() && self.sampling_rate > 0.0) {
            return Err(NfbError::config(format!(
                "simulated sampling rate must be positive, got {}",
                self.sampling_rate
            )));
        }
        if self.channel_labels.is_empty() {
            return Err(NfbError::config("simulated stream needs at least one channel"));
        }
        if !(self.noise_std.is_finite() && self.noise_std >= 0.0) {
            return Err(NfbError::config(format!(
                "noise standard deviation must not be negative, got {}",
                self.noise_std
            )));
        }
        Ok(())
    }
}

/// EEG signal simulator
pub struct EegSimulator {
    config: EegConfig,
    rng: StdRng,
    noise: Option<Normal<f64>>,
    motor: Vec<bool>,
    sample_index: u64,
}

impl EegSimulator {
    pub fn new(config: EegConfig) -> NfbResult<Self> {
        config.validate()?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let noise = if config.noise_std > 0.0 {
            let dist = Normal::new(0.0, config.noise_std).map_err(|e| {
                NfbError::config(format!("failed to create noise distribution: {}", e))
            })?;
            Some(dist)
        } else {
            None
        };

        let motor = config
            .channel_labels
            .iter()
            .map(|label| MOTOR_LABELS.contains(&label.as_str()))
            .collect();

        Ok(EegSimulator {
            config,
            rng,
            noise,
            motor,
            sample_index: 0,
        })
    }

    /// Generate the next `n_samples` frames, continuing from the previous call
    pub fn generate(&mut self, n_samples: usize) -> NfbResult<Vec<SampleFrame>> {
        let channel_count = self.config.channel_labels.len();
        let mut data = Vec::with_capacity(n_samples * channel_count);
        let mut timestamps = Vec::with_capacity(n_samples);

        for _ in 0..n_samples {
            let time = self.sample_index as f64 / self.config.sampling_rate;
            let gain = self.config.pattern.level_at(time);

            for channel_idx in 0..channel_count {
                let value = self.generate_sample(time, channel_idx, gain);
                data.push(value);
            }

            timestamps.push(time);
            self.sample_index += 1;
        }

        SampleFrame::from_interleaved(&data, channel_count, &timestamps)
    }

    fn generate_sample(&mut self, time: f64, channel_idx: usize, gain: f64) -> f64 {
        let mu_gain = if self.motor[channel_idx] { gain } else { 0.5 };

        let mu = self.config.mu_amplitude
            * mu_gain
            * (2.0 * PI * self.config.mu_frequency * time).sin();

        // Small per-channel phase offset keeps non-motor channels distinct
        let beta = self.config.beta_amplitude
            * (2.0 * PI * self.config.beta_frequency * time + channel_idx as f64 * 0.3).sin();

        let noise = match self.noise {
            Some(dist) => dist.sample(&mut self.rng),
            None => 0.0,
        };

        mu + beta + noise
    }

    /// Switch the mu gain schedule without restarting stream time
    pub fn set_pattern(&mut self, pattern: MuPattern) {
        self.config.pattern = pattern;
    }

    /// Seconds of signal generated so far
    pub fn elapsed(&self) -> f64 {
        self.sample_index as f64 / self.config.sampling_rate
    }

    pub fn samples_generated(&self) -> u64 {
        self.sample_index
    }

    pub fn config(&self) -> &EegConfig {
        &self.config
    }

    /// Metadata a discovery backend would advertise for this simulator
    pub fn descriptor(&self, name: &str, source_id: &str) -> StreamDescriptor {
        StreamDescriptor {
            name: name.to_string(),
            stream_type: "EEG".to_string(),
            channel_count: self.config.channel_labels.len(),
            nominal_srate: self.config.sampling_rate,
            source_id: source_id.to_string(),
            channel_labels: Some(self.config.channel_labels.clone()),
        }
    }
}
