//! # Listener Configuration
//!
//! Everything here is fixed once a [`crate::pipeline::Listener`] is built.
//! Configurations can be written by hand or loaded from JSON:
//!
//! ```json
//! { "sample_rate": 48000.0, "window_size": 2048, "threshold": 0.1, "difference": "fft" }
//! ```
//!
//! Missing fields fall back to [`ListenerConfig::default`].

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default sample rate in Hz.
pub const DEFAULT_SAMPLE_RATE: f32 = 44100.0;
/// Default analysis window (about 46ms at 44.1 kHz).
pub const DEFAULT_WINDOW_SIZE: usize = 2048;
/// Default ring buffer capacity.
pub const DEFAULT_BUFFER_CAPACITY: usize = 4096;
/// Default YIN threshold: 5% aperiodicity tolerance.
pub const DEFAULT_THRESHOLD: f32 = 0.05;

/// How the YIN difference function is computed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DifferenceMethod {
    /// Straight O(n²) sum of squared differences.
    #[default]
    Direct,
    /// Cross-correlation through a forward/inverse FFT.
    Fft,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Sample rate of the incoming audio in Hz.
    pub sample_rate: f32,
    /// Samples per analysis call. Must be even.
    pub window_size: usize,
    /// Ring buffer capacity in samples, at least `window_size`.
    pub buffer_capacity: usize,
    /// Allowed aperiodicity, strictly between 0 and 1.
    pub threshold: f32,
    pub difference: DifferenceMethod,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            window_size: DEFAULT_WINDOW_SIZE,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            threshold: DEFAULT_THRESHOLD,
            difference: DifferenceMethod::Direct,
        }
    }
}

impl ListenerConfig {
    /// Checks every field, reporting the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size == 0 || self.window_size % 2 != 0 {
            return Err(ConfigError::WindowSize(self.window_size));
        }
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err(ConfigError::SampleRate(self.sample_rate));
        }
        // NaN fails both comparisons, so test for the valid range.
        if !(self.threshold > 0.0 && self.threshold < 1.0) {
            return Err(ConfigError::Threshold(self.threshold));
        }
        if self.buffer_capacity < self.window_size {
            return Err(ConfigError::BufferCapacity {
                capacity: self.buffer_capacity,
                window_size: self.window_size,
            });
        }
        Ok(())
    }

    /// Parses and validates a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).context("Invalid listener configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_json_str(&json)
    }

    /// Duration covered by one analysis window, in seconds.
    pub fn window_duration(&self) -> f32 {
        self.window_size as f32 / self.sample_rate
    }
}
