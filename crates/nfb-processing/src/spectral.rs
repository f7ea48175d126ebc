//! Band-power estimation with Welch's averaged periodogram
//!
//! Segment length is `min(len, floor(fs))` with 50% overlap, a periodic Hann
//! window, constant detrend per segment and one-sided density scaling. Band
//! power is the mean PSD over bins whose center lies inside the band.

use crate::config::FrequencyBand;
use nfb_core::{NfbError, NfbResult};
use realfft::RealFftPlanner;

/// Mean spectral density within a band; never negative
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd)]
pub struct BandPower(f64);

impl BandPower {
    pub const ZERO: BandPower = BandPower(0.0);

    /// Wrap a raw value; negative or non-finite input collapses to zero
    pub fn new(value: f64) -> Self {
        if value.is_finite() && value > 0.0 {
            BandPower(value)
        } else {
            BandPower::ZERO
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

/// One-sided power spectral density estimate
#[derive(Debug, Clone, PartialEq)]
pub struct PowerSpectrum {
    /// Bin center frequencies in Hz
    pub frequencies: Vec<f64>,
    /// Density per bin (signal units squared per Hz)
    pub density: Vec<f64>,
}

impl PowerSpectrum {
    fn empty() -> Self {
        PowerSpectrum {
            frequencies: Vec::new(),
            density: Vec::new(),
        }
    }

    /// Mean density over bins inside `band`; zero when no bin falls in range
    pub fn mean_in_band(&self, band: FrequencyBand) -> BandPower {
        let (sum, count) = self
            .frequencies
            .iter()
            .zip(&self.density)
            .filter(|&(&f, _)| band.contains(f))
            .fold((0.0, 0usize), |(sum, count), (_, &p)| (sum + p, count + 1));

        if count == 0 {
            BandPower::ZERO
        } else {
            BandPower::new(sum / count as f64)
        }
    }
}

/// Welch PSD estimator bound to one sampling rate
pub struct SpectralEstimator {
    sample_rate: f64,
    planner: RealFftPlanner<f64>,
}

impl SpectralEstimator {
    pub fn new(sample_rate: f64) -> NfbResult<Self> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(NfbError::config(format!(
                "sample rate must be positive, got {}",
                sample_rate
            )));
        }

        Ok(SpectralEstimator {
            sample_rate,
            planner: RealFftPlanner::new(),
        })
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Segment length used for a sequence of `len` samples
    pub fn segment_length(&self, len: usize) -> usize {
        len.min(self.sample_rate as usize)
    }

    /// Welch power spectral density of `samples`
    pub fn welch_psd(&mut self, samples: &[f64]) -> NfbResult<PowerSpectrum> {
        let nperseg = self.segment_length(samples.len());
        if nperseg < 2 {
            return Ok(PowerSpectrum::empty());
        }

        let noverlap = nperseg / 2;
        let step = nperseg - noverlap;
        let segment_count = (samples.len() - noverlap) / step;

        let window = hann_periodic(nperseg);
        let window_energy: f64 = window.iter().map(|w| w * w).sum();
        let scale = 1.0 / (self.sample_rate * window_energy);

        let fft = self.planner.plan_fft_forward(nperseg);
        let mut input = fft.make_input_vec();
        let mut spectrum = fft.make_output_vec();
        let mut density = vec![0.0; spectrum.len()];

        for segment_idx in 0..segment_count {
            let start = segment_idx * step;
            let segment = &samples[start..start + nperseg];
            let mean = segment.iter().sum::<f64>() / nperseg as f64;

            for ((slot, &x), &w) in input.iter_mut().zip(segment).zip(&window) {
                *slot = (x - mean) * w;
            }

            fft.process(&mut input, &mut spectrum)
                .map_err(|e| NfbError::Spectral {
                    reason: e.to_string(),
                })?;

            for (acc, bin) in density.iter_mut().zip(&spectrum) {
                *acc += bin.norm_sqr() * scale;
            }
        }

        // One-sided spectrum: fold negative frequencies onto positive bins.
        // DC, and Nyquist for even lengths, have no mirror image.
        let last = density.len() - 1;
        let fold_end = if nperseg % 2 == 0 { last } else { last + 1 };
        for value in &mut density[1..fold_end] {
            *value *= 2.0;
        }

        for value in &mut density {
            *value /= segment_count as f64;
        }

        let resolution = self.sample_rate / nperseg as f64;
        let frequencies = (0..density.len()).map(|k| k as f64 * resolution).collect();

        Ok(PowerSpectrum {
            frequencies,
            density,
        })
    }

    /// Mean PSD of `samples` within `band`
    pub fn band_power(&mut self, samples: &[f64], band: FrequencyBand) -> NfbResult<BandPower> {
        Ok(self.welch_psd(samples)?.mean_in_band(band))
    }
}

/// Periodic Hann window (the DFT-even form used for spectral analysis)
fn hann_periodic(len: usize) -> Vec<f64> {
    (0..len)
        .map(|i| 0.5 - 0.5 * (2.0 * std::f64::consts::PI * i as f64 / len as f64).cos())
        .collect()
}
