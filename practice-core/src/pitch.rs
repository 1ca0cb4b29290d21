//! # Pitch Detection Module
//!
//! Turns a stream of hop-sized audio frames into per-frame fundamental
//! frequency estimates using the YIN algorithm.
//!
//! ## Features
//! - Sliding analysis window: hops accumulate until a full window exists
//! - FFT-computed difference function (see [`crate::fft`])
//! - Absolute-threshold dip search with local-minimum descent
//! - Parabolic interpolation for sub-sample accuracy
//! - Amplitude, confidence and range gating: anything doubtful is "no pitch"

use log::trace;

use crate::audio::AudioFrame;
use crate::config::DetectorConfig;
use crate::error::ConfigError;
use crate::fft::{self, Autocorrelator};

/// Result of analysing one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchEstimate {
    /// Detected fundamental, `None` for silence, noise or ambiguity
    pub frequency_hz: Option<f32>,
    /// Estimator's reliability in 0.0..=1.0
    pub confidence: f32,
}

impl PitchEstimate {
    pub const fn absent() -> Self {
        Self {
            frequency_hz: None,
            confidence: 0.0,
        }
    }

    pub fn is_voiced(&self) -> bool {
        self.frequency_hz.is_some()
    }
}

/// Why a window produced no pitch. Never surfaced beyond trace logging.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Ambiguity {
    WindowFilling,
    WrongLength(usize),
    NonFinite,
    Silence(f32),
    NoPeriod,
    LowConfidence(f32),
    OutOfRange(f32),
}

/// A YIN pitch estimator with its own overlap buffer.
///
/// Apart from the analysis window the estimator carries no state between
/// frames, and it never blocks.
#[derive(Debug)]
pub struct PitchEstimator {
    config: DetectorConfig,
    /// Most recent `window_size` samples, oldest first
    window: Vec<f32>,
    filled: usize,
    analysis: Vec<f32>,
    products: Vec<f32>,
    cmnd: Vec<f32>,
    autocorr: Autocorrelator,
    min_tau: usize,
    max_tau: usize,
}

impl PitchEstimator {
    pub fn new(config: DetectorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let size = config.window_size;
        let half = size / 2;
        let rate = config.sample_rate as f32;
        let min_tau = ((rate / config.max_frequency).floor() as usize).max(2);
        let max_tau = ((rate / config.min_frequency).ceil() as usize).min(half - 2);

        Ok(Self {
            window: vec![0.0; size],
            filled: 0,
            analysis: vec![0.0; size],
            products: vec![0.0; half],
            cmnd: vec![1.0; half],
            autocorr: Autocorrelator::new(size),
            min_tau,
            max_tau,
            config,
        })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Drops buffered audio; the next estimate waits for a fresh window.
    pub fn reset(&mut self) {
        self.window.fill(0.0);
        self.filled = 0;
    }

    /// Appends one frame and analyses the resulting window.
    pub fn process(&mut self, frame: &AudioFrame) -> PitchEstimate {
        self.process_samples(frame.samples())
    }

    pub fn process_samples(&mut self, samples: &[f32]) -> PitchEstimate {
        match self.push_and_estimate(samples) {
            Ok(estimate) => estimate,
            Err((ambiguity, confidence)) => {
                trace!("no pitch: {:?}", ambiguity);
                PitchEstimate {
                    frequency_hz: None,
                    confidence,
                }
            }
        }
    }

    fn push_and_estimate(&mut self, samples: &[f32]) -> Result<PitchEstimate, (Ambiguity, f32)> {
        if samples.len() != self.config.hop_size {
            return Err((Ambiguity::WrongLength(samples.len()), 0.0));
        }
        if samples.iter().any(|s| !s.is_finite()) {
            // A corrupted buffer poisons the whole window.
            self.reset();
            return Err((Ambiguity::NonFinite, 0.0));
        }
        self.push(samples);
        if self.filled < self.window.len() {
            return Err((Ambiguity::WindowFilling, 0.0));
        }
        self.estimate_window()
    }

    fn push(&mut self, samples: &[f32]) {
        let size = self.window.len();
        let incoming = &samples[samples.len().saturating_sub(size)..];
        let n = incoming.len();
        self.window.copy_within(n.., 0);
        self.window[size - n..].copy_from_slice(incoming);
        self.filled = (self.filled + n).min(size);
    }

    fn estimate_window(&mut self) -> Result<PitchEstimate, (Ambiguity, f32)> {
        let size = self.window.len();
        let half = size / 2;

        self.analysis.copy_from_slice(&self.window);
        fft::remove_dc_offset(&mut self.analysis);

        // --- Noise Gate: RMS over the whole window ---
        let rms = (self.analysis.iter().map(|&s| s * s).sum::<f32>() / size as f32).sqrt();
        if rms < self.config.silence_rms {
            return Err((Ambiguity::Silence(rms), 0.0));
        }

        // --- Difference function: d(tau) = e(0) + e(tau) - 2 r(tau) ---
        self.autocorr.lagged_products(&self.analysis, &mut self.products);
        let energy_head = self.products[0];
        let mut energy_lag = energy_head;
        let mut running_sum = 0.0;
        self.cmnd[0] = 1.0;
        for tau in 1..half {
            // Slide the energy term one sample along.
            energy_lag += self.analysis[tau + half - 1].powi(2) - self.analysis[tau - 1].powi(2);
            let diff = (energy_head + energy_lag - 2.0 * self.products[tau]).max(0.0);

            // --- Cumulative mean normalized difference ---
            running_sum += diff;
            self.cmnd[tau] = if running_sum > 0.0 {
                diff * tau as f32 / running_sum
            } else {
                1.0
            };
        }

        let tau = self.find_period().ok_or((Ambiguity::NoPeriod, 0.0))?;
        let confidence = (1.0 - self.cmnd[tau]).clamp(0.0, 1.0);
        if confidence < self.config.confidence_threshold {
            return Err((Ambiguity::LowConfidence(confidence), confidence));
        }

        // --- Parabolic interpolation for better precision ---
        let y1 = self.cmnd[tau - 1];
        let y2 = self.cmnd[tau];
        let y3 = self.cmnd[tau + 1];
        let curvature = y1 - 2.0 * y2 + y3;
        let period = if curvature.abs() > f32::EPSILON {
            let shift = ((y1 - y3) / (2.0 * curvature)).clamp(-0.5, 0.5);
            tau as f32 + shift
        } else {
            tau as f32
        };

        let frequency = self.config.sample_rate as f32 / period;
        if !frequency.is_finite()
            || frequency < self.config.min_frequency
            || frequency > self.config.max_frequency
        {
            return Err((Ambiguity::OutOfRange(frequency), confidence));
        }

        Ok(PitchEstimate {
            frequency_hz: Some(frequency),
            confidence,
        })
    }

    /// First dip under the YIN threshold, followed down to its local minimum;
    /// the global minimum of the search range when nothing dips that low.
    fn find_period(&self) -> Option<usize> {
        let (lo, hi) = (self.min_tau, self.max_tau);
        if lo >= hi {
            return None;
        }

        let mut tau = lo;
        while tau < hi {
            if self.cmnd[tau] < self.config.yin_threshold {
                while tau + 1 < hi && self.cmnd[tau + 1] < self.cmnd[tau] {
                    tau += 1;
                }
                return Some(tau);
            }
            tau += 1;
        }

        (lo..hi).min_by(|&a, &b| {
            self.cmnd[a]
                .partial_cmp(&self.cmnd[b])
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    }
}
