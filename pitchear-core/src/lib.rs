// pitchear-core/src/lib.rs

//! The core logic for the pitchear listener.
//! This crate is responsible for buffering live audio, estimating its
//! fundamental frequency, and classifying it against a pitch table.
//! It is completely headless and contains no rendering code.
//!
//! ```no_run
//! use pitchear_core::{Listener, ListenerConfig, PitchTable};
//! use pitchear_core::source::{SineSource, spawn_producer};
//! use std::time::Duration;
//!
//! let config = ListenerConfig::default();
//! let mut listener = Listener::new(config.clone(), PitchTable::flute())?;
//! let _producer = spawn_producer(
//!     SineSource::new(880.0, 0.5, config.sample_rate),
//!     listener.buffer(),
//!     512,
//!     Duration::from_secs_f32(512.0 / config.sample_rate),
//! )?;
//!
//! // Once per frame:
//! let reading = listener.listen();
//! println!("{} ({:.1} Hz, {:.2})", reading.pitch.title(), reading.frequency, reading.confidence);
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod audio;
pub mod config;
pub mod error;
pub mod fft;
pub mod pipeline;
pub mod ring_buffer;
pub mod source;
pub mod tuning;
pub mod yin;

pub use config::{DifferenceMethod, ListenerConfig};
pub use error::{ConfigError, TableError};
pub use pipeline::{Listener, Reading};
pub use ring_buffer::RingBuffer;
pub use tuning::{Pitch, PitchTable};
pub use yin::{Estimate, YinDetector};
