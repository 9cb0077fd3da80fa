//! # FFT Difference Module
//!
//! Computes the YIN difference function through the frequency domain. The
//! squared difference expands to
//!
//! `d(tau) = E_anchor + E(tau) - 2 r(tau)`
//!
//! where `E_anchor` is the energy of the first half of the window, `E(tau)`
//! the energy of the half-window starting at `tau`, and `r(tau)` the
//! cross-correlation of the anchor half with the whole window. The
//! correlation comes from one forward FFT of each operand and one inverse FFT
//! of their product, which beats the direct O(n²) sum for large windows.

use std::sync::Arc;

use rustfft::{Fft, FftPlanner, num_complex::Complex};

/// Reusable FFT plans and scratch for one window size.
pub struct FftDifference {
    window_size: usize,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
    signal: Vec<Complex<f64>>,
    anchor: Vec<Complex<f64>>,
}

impl std::fmt::Debug for FftDifference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FftDifference")
            .field("window_size", &self.window_size)
            .finish_non_exhaustive()
    }
}

impl FftDifference {
    pub fn new(window_size: usize) -> Self {
        let mut planner = FftPlanner::new();
        Self {
            window_size,
            forward: planner.plan_fft_forward(window_size),
            inverse: planner.plan_fft_inverse(window_size),
            signal: vec![Complex::new(0.0, 0.0); window_size],
            anchor: vec![Complex::new(0.0, 0.0); window_size],
        }
    }

    /// Writes `d(tau)` for every `tau < diff.len()` into `diff`.
    ///
    /// `window` must hold `window_size` samples and `diff` half as many.
    /// Because `i + tau` never exceeds `window_size - 2`, the circular
    /// correlation of size `window_size` has no wrap-around terms.
    pub fn difference(&mut self, window: &[f32], diff: &mut [f64]) {
        let half = diff.len();
        assert_eq!(window.len(), self.window_size);
        assert_eq!(half * 2, self.window_size);

        for (i, (signal, anchor)) in self.signal.iter_mut().zip(self.anchor.iter_mut()).enumerate() {
            let sample = f64::from(window[i]);
            *signal = Complex::new(sample, 0.0);
            *anchor = Complex::new(if i < half { sample } else { 0.0 }, 0.0);
        }

        self.forward.process(&mut self.signal);
        self.forward.process(&mut self.anchor);
        for (signal, anchor) in self.signal.iter_mut().zip(&self.anchor) {
            *signal *= anchor.conj();
        }
        self.inverse.process(&mut self.signal);

        // rustfft leaves the inverse unnormalized.
        let scale = 1.0 / self.window_size as f64;
        let anchor_energy: f64 = window[..half].iter().map(|&s| f64::from(s).powi(2)).sum();
        let mut lagged_energy = anchor_energy;

        for tau in 0..half {
            if tau > 0 {
                lagged_energy += f64::from(window[tau + half - 1]).powi(2)
                    - f64::from(window[tau - 1]).powi(2);
            }
            let correlation = self.signal[tau].re * scale;
            // Rounding can dip a few ulps below zero at near-perfect lags.
            diff[tau] = (anchor_energy + lagged_energy - 2.0 * correlation).max(0.0);
        }
    }
}
