//! # Listener Pipeline
//!
//! Glue between the shared ring buffer, the YIN detector and a pitch table.
//! A producer (cpal callback or [`crate::source::spawn_producer`]) writes into
//! [`Listener::buffer`]; the caller invokes [`Listener::listen`] once per
//! frame and gets a fresh [`Reading`].
//!
//! The detector runs on a private copy of the newest window, so the lock on
//! the buffer is only held for the copy.

use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use tracing::debug;

use crate::config::ListenerConfig;
use crate::ring_buffer::RingBuffer;
use crate::tuning::{Pitch, PitchTable, cents_deviation};
use crate::yin::{Estimate, YinDetector};

/// One classified reading, produced per caller frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    /// Detected frequency in Hz, -1 when no pitch was found.
    pub frequency: f32,
    pub confidence: f32,
    /// Nearest table entry (the first entry when nothing was found).
    pub pitch: Pitch,
    pub index: usize,
    /// Deviation from `pitch` in cents; 0 when nothing was found.
    pub cents: f32,
}

impl Reading {
    pub fn is_pitched(&self) -> bool {
        self.frequency > 0.0
    }
}

#[derive(Debug)]
pub struct Listener {
    config: ListenerConfig,
    buffer: Arc<RingBuffer>,
    detector: YinDetector,
    table: PitchTable,
    last_index: Option<usize>,
}

impl Listener {
    /// Validates `config` and builds the buffer and detector.
    pub fn new(config: ListenerConfig, table: PitchTable) -> Result<Self> {
        let detector = YinDetector::from_config(&config)?;
        let buffer = Arc::new(RingBuffer::new(config.buffer_capacity));
        debug!(
            capacity = config.buffer_capacity,
            pitches = table.len(),
            "listener ready"
        );
        Ok(Self {
            config,
            buffer,
            detector,
            table,
            last_index: None,
        })
    }

    /// Shared handle for whatever produces the samples.
    pub fn buffer(&self) -> Arc<RingBuffer> {
        Arc::clone(&self.buffer)
    }

    pub fn config(&self) -> &ListenerConfig {
        &self.config
    }

    pub fn table(&self) -> &PitchTable {
        &self.table
    }

    pub fn detector(&self) -> &YinDetector {
        &self.detector
    }

    /// Analyses the newest window in the buffer and classifies it.
    pub fn listen(&mut self) -> Reading {
        let window = self.buffer.latest(self.config.window_size);
        let estimate = self.detector.estimate(&window);
        self.classify(estimate)
    }

    /// Classifies an estimate against the table.
    pub fn classify(&mut self, estimate: Estimate) -> Reading {
        let (pitch, index) = self.table.nearest(estimate.frequency);
        let cents = if estimate.is_pitched() && pitch.frequency > 0.0 {
            cents_deviation(estimate.frequency, pitch.frequency)
        } else {
            0.0
        };

        if self.last_index != Some(index) {
            debug!(
                pitch = %pitch.name,
                frequency = estimate.frequency,
                confidence = estimate.confidence,
                "pitch changed"
            );
            self.last_index = Some(index);
        }

        Reading {
            frequency: estimate.frequency,
            confidence: estimate.confidence,
            pitch: pitch.clone(),
            index,
            cents,
        }
    }
}
