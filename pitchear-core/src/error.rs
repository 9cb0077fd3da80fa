//! # Error Types
//!
//! Construction-time errors for the listener pipeline. Everything here is
//! reported when a detector, buffer or table is built, never on first use.
//! "No pitch found" is not an error; see [`crate::yin::Estimate::NONE`].

/// Invalid listener configuration.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("window size must be a positive even number of samples, got {0}")]
    WindowSize(usize),
    #[error("sample rate must be a positive finite number of Hz, got {0}")]
    SampleRate(f32),
    #[error("threshold must lie strictly between 0 and 1, got {0}")]
    Threshold(f32),
    #[error("buffer capacity {capacity} is smaller than the analysis window {window_size}")]
    BufferCapacity { capacity: usize, window_size: usize },
}

/// Invalid pitch table.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TableError {
    #[error("pitch table is empty")]
    Empty,
    #[error("pitch table is not strictly increasing at index {index} ({frequency} Hz)")]
    NotSorted { index: usize, frequency: f32 },
    #[error("pitch name {0:?} appears more than once")]
    DuplicateName(String),
}
