//! # Sample Source Module
//!
//! Producers that keep a [`RingBuffer`] filled from their own thread. The
//! buffer never spawns anything itself; whoever owns the audio owns the
//! thread.
//!
//! ## Features
//! - `SampleSource` trait for anything that can fill a frame of mono samples
//! - Phase-continuous sine and silence generators
//! - A producer thread with channel-based shutdown

use std::f64::consts::TAU;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Sender, select};
use tracing::{debug, warn};

use crate::ring_buffer::RingBuffer;

/// Anything that can produce consecutive frames of mono audio.
pub trait SampleSource {
    /// Fills `frame` with the next samples of the stream.
    fn fill(&mut self, frame: &mut [f32]);
}

/// A pure tone that stays phase-continuous across frames.
#[derive(Debug, Clone)]
pub struct SineSource {
    frequency: f64,
    amplitude: f32,
    sample_rate: f64,
    phase: f64,
}

impl SineSource {
    pub fn new(frequency: f32, amplitude: f32, sample_rate: f32) -> Self {
        Self {
            frequency: f64::from(frequency),
            amplitude,
            sample_rate: f64::from(sample_rate),
            phase: 0.0,
        }
    }
}

impl SampleSource for SineSource {
    fn fill(&mut self, frame: &mut [f32]) {
        let step = TAU * self.frequency / self.sample_rate;
        for sample in frame.iter_mut() {
            *sample = self.amplitude * self.phase.sin() as f32;
            self.phase = (self.phase + step) % TAU;
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SilenceSource;

impl SampleSource for SilenceSource {
    fn fill(&mut self, frame: &mut [f32]) {
        frame.fill(0.0);
    }
}

/// Handle to a running producer thread.
///
/// Dropping the handle stops the thread as well.
#[derive(Debug)]
pub struct ProducerHandle {
    shutdown_tx: Sender<()>,
    thread_handle: Option<JoinHandle<u64>>,
}

impl ProducerHandle {
    /// Signals the thread to stop, waits for it, and returns the number of
    /// frames it wrote.
    pub fn stop(mut self) -> u64 {
        self.shutdown()
    }

    fn shutdown(&mut self) -> u64 {
        // The thread may already have exited; a closed channel is fine.
        let _ = self.shutdown_tx.try_send(());
        match self.thread_handle.take().map(JoinHandle::join) {
            Some(Ok(frames)) => frames,
            Some(Err(_)) => {
                warn!("producer thread panicked");
                0
            }
            None => 0,
        }
    }
}

impl Drop for ProducerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Spawns a thread that writes one `frame_len` frame from `source` into
/// `buffer` every `period`, until the returned handle is stopped.
///
/// # Arguments
/// * `source` - Where the samples come from
/// * `buffer` - Shared ring buffer the consumer snapshots
/// * `frame_len` - Samples per write
/// * `period` - Time between writes; `frame_len / sample_rate` runs in real time
pub fn spawn_producer<S>(
    mut source: S,
    buffer: Arc<RingBuffer>,
    frame_len: usize,
    period: Duration,
) -> std::io::Result<ProducerHandle>
where
    S: SampleSource + Send + 'static,
{
    let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
    let thread_handle = thread::Builder::new()
        .name("pitchear-producer".into())
        .spawn(move || {
            debug!(frame_len, ?period, "producer started");
            let mut frame = vec![0.0; frame_len];
            let mut frames = 0u64;
            loop {
                select! {
                    recv(shutdown_rx) -> _ => break,
                    default(period) => {
                        source.fill(&mut frame);
                        buffer.write(&frame);
                        frames += 1;
                    }
                }
            }
            debug!(frames, "producer stopped");
            frames
        })?;

    Ok(ProducerHandle {
        shutdown_tx,
        thread_handle: Some(thread_handle),
    })
}
