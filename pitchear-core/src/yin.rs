//! # YIN Pitch Detection Module
//!
//! A stateful implementation of the YIN fundamental frequency estimator
//! (de Cheveigné & Kawahara, 2002) tuned for a frame-rate-driven caller.
//!
//! ## Stages
//! 1. Squared difference of the window against lagged copies of itself
//! 2. Cumulative mean normalized difference
//! 3. Absolute threshold search, walking down to the bottom of the first dip
//! 4. Parabolic interpolation for sub-sample lag accuracy
//!
//! The detector keeps a difference buffer of `window_size / 2` values that is
//! reused between calls. [`YinDetector::estimate`] clears it before every run,
//! so consecutive calls on unrelated windows never influence each other.

use serde::Serialize;
use tracing::debug;

use crate::config::{DifferenceMethod, ListenerConfig};
use crate::error::ConfigError;
use crate::fft::FftDifference;

/// Result of one analysis call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Estimate {
    /// Fundamental frequency in Hz, or `-1.0` when no pitch was found.
    pub frequency: f32,
    /// `1 - d'(tau)` at the chosen lag, or `0.0` when no pitch was found.
    pub confidence: f32,
}

impl Estimate {
    /// Silence, noise, or anything else without a clear period.
    pub const NONE: Estimate = Estimate { frequency: -1.0, confidence: 0.0 };

    pub fn is_pitched(&self) -> bool {
        self.frequency > 0.0
    }
}

#[derive(Debug)]
pub struct YinDetector {
    sample_rate: f32,
    window_size: usize,
    threshold: f64,
    confidence: f32,
    diff: Vec<f64>,
    fft: Option<FftDifference>,
}

impl YinDetector {
    /// Creates a detector using the direct difference function.
    ///
    /// # Arguments
    /// * `sample_rate` - Sample rate of the analysed windows in Hz
    /// * `window_size` - Samples per call; must be even
    /// * `threshold` - Allowed aperiodicity in (0, 1); 0.05 accepts pitches
    ///   with roughly 95% confidence
    pub fn new(sample_rate: f32, window_size: usize, threshold: f32) -> Result<Self, ConfigError> {
        Self::from_config(&ListenerConfig {
            sample_rate,
            window_size,
            buffer_capacity: window_size,
            threshold,
            difference: DifferenceMethod::Direct,
        })
    }

    /// Creates a detector from a listener configuration.
    pub fn from_config(config: &ListenerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let fft = match config.difference {
            DifferenceMethod::Direct => None,
            DifferenceMethod::Fft => Some(FftDifference::new(config.window_size)),
        };
        debug!(
            sample_rate = config.sample_rate,
            window_size = config.window_size,
            threshold = config.threshold,
            difference = ?config.difference,
            "YIN detector ready"
        );
        Ok(Self {
            sample_rate: config.sample_rate,
            window_size: config.window_size,
            threshold: f64::from(config.threshold),
            confidence: 0.0,
            diff: vec![0.0; config.window_size / 2],
            fft,
        })
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Confidence of the most recent estimate (0.0 after `reset`).
    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Clears the reported confidence and zeroes the difference buffer.
    pub fn reset(&mut self) {
        self.confidence = 0.0;
        self.diff.fill(0.0);
    }

    /// Estimates the fundamental frequency of `window`.
    ///
    /// # Panics
    /// * If `window.len()` differs from the configured window size. The
    ///   difference stage reads up to index `window_size - 2`, so a shorter
    ///   window cannot be analysed and a longer one would be silently cut.
    pub fn estimate(&mut self, window: &[f32]) -> Estimate {
        assert_eq!(
            window.len(),
            self.window_size,
            "YIN window must hold exactly the configured number of samples"
        );
        self.reset();

        self.difference(window);
        self.cumulative_mean_normalized_difference();

        let Some(tau) = self.absolute_threshold() else {
            return Estimate::NONE;
        };
        let refined = self.parabolic_interpolation(tau);
        let frequency = (f64::from(self.sample_rate) / refined) as f32;
        if !frequency.is_finite() || frequency <= 0.0 {
            self.confidence = 0.0;
            return Estimate::NONE;
        }

        Estimate { frequency, confidence: self.confidence }
    }

    /// Step 1: squared difference for every lag in `[0, half)`.
    fn difference(&mut self, window: &[f32]) {
        if let Some(fft) = self.fft.as_mut() {
            fft.difference(window, &mut self.diff);
            return;
        }
        let half = self.diff.len();
        for (tau, slot) in self.diff.iter_mut().enumerate() {
            *slot += window[..half]
                .iter()
                .zip(&window[tau..tau + half])
                .map(|(&a, &b)| {
                    let delta = f64::from(a) - f64::from(b);
                    delta * delta
                })
                .sum::<f64>();
        }
    }

    /// Step 2: replace each value with its ratio to the running mean.
    fn cumulative_mean_normalized_difference(&mut self) {
        let mut running_sum = 0.0;
        self.diff[0] = 1.0;
        for tau in 1..self.diff.len() {
            running_sum += self.diff[tau];
            if running_sum > 0.0 {
                self.diff[tau] *= tau as f64 / running_sum;
            } else {
                // Digital silence so far: treat as fully aperiodic.
                self.diff[tau] = 1.0;
            }
        }
    }

    /// Step 3: first lag under the threshold, walked down to its local minimum.
    ///
    /// Lags 0 and 1 are skipped. Stores the confidence on success.
    fn absolute_threshold(&mut self) -> Option<usize> {
        let half = self.diff.len();
        let mut tau = (2..half).find(|&tau| self.diff[tau] < self.threshold)?;
        while tau + 1 < half && self.diff[tau + 1] < self.diff[tau] {
            tau += 1;
        }
        self.confidence = (1.0 - self.diff[tau]) as f32;
        Some(tau)
    }

    /// Step 4: sub-sample refinement of `tau` through its neighbours.
    fn parabolic_interpolation(&self, tau: usize) -> f64 {
        let d = &self.diff;
        let x0 = if tau < 1 { tau } else { tau - 1 };
        let x2 = if tau + 1 < d.len() { tau + 1 } else { tau };

        if x0 == tau && x2 == tau {
            return tau as f64;
        }
        if x0 == tau {
            return if d[tau] <= d[x2] { tau as f64 } else { x2 as f64 };
        }
        if x2 == tau {
            return if d[tau] <= d[x0] { tau as f64 } else { x0 as f64 };
        }

        let (s0, s1, s2) = (d[x0], d[tau], d[x2]);
        let denominator = 2.0 * (2.0 * s1 - s2 - s0);
        if denominator == 0.0 || !denominator.is_finite() {
            return tau as f64;
        }
        tau as f64 + (s2 - s0) / denominator
    }
}
