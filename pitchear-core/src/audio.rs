//! # Audio Capture Module
//!
//! This module handles real-time audio capture using CPAL (Cross-Platform Audio Library).
//! The input callback is the producer side of the listener: it writes every
//! delivered block straight into the shared [`RingBuffer`].
//!
//! ## Features
//! - Automatic audio device selection
//! - Sample rate negotiation against the device's supported ranges
//! - Mono or interleaved multi-channel input (first channel is kept)

use std::sync::Arc;

use anyhow::{Result, anyhow};
use cpal::SupportedStreamConfigRange;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{info, warn};

use crate::ring_buffer::RingBuffer;

/// A selected input device and the stream configuration to open it with.
pub struct InputDevice {
    device: cpal::Device,
    config: cpal::StreamConfig,
}

impl InputDevice {
    /// Sample rate the stream will deliver, in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    pub fn channels(&self) -> u16 {
        self.config.channels
    }
}

/// Selects the default input device and the f32 configuration closest to
/// `target_rate`.
///
/// # Returns
/// * `Ok(input)` - Device and configuration; check `sample_rate()` since the
///   device may not support the requested rate
/// * `Err(e)` - No input device or no f32 input format
pub fn select_input(target_rate: u32) -> Result<InputDevice> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow!("No input device available"))?;

    let name = device.name()?;
    info!(device = %name, "using audio input device");

    let configs = device.supported_input_configs()?.collect::<Vec<_>>();
    let supported_config = find_supported_config(configs, target_rate)
        .ok_or_else(|| anyhow!("No suitable f32 input format found"))?;

    let rate = target_rate.clamp(
        supported_config.min_sample_rate().0,
        supported_config.max_sample_rate().0,
    );
    let config: cpal::StreamConfig = supported_config.with_sample_rate(cpal::SampleRate(rate)).into();

    info!(sample_rate = rate, channels = config.channels, "selected input format");
    Ok(InputDevice { device, config })
}

/// Opens and starts the input stream, feeding `buffer` from the callback.
///
/// The returned stream must be kept alive for capture to continue.
pub fn start_capture(input: &InputDevice, buffer: Arc<RingBuffer>) -> Result<cpal::Stream> {
    let channels = usize::from(input.config.channels);
    let err_fn = |err| warn!("an error occurred on the audio stream: {}", err);

    let stream = input.device.build_input_stream(
        &input.config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            buffer.write_interleaved(data, channels);
        },
        err_fn,
        None,
    )?;

    stream.play()?;
    Ok(stream)
}

/// Finds the best supported audio configuration for the target sample rate.
///
/// Only 32-bit float formats qualify. Among those, mono is preferred, then
/// the range closest to `target_rate`.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| {
            let (min, max) = (c.min_sample_rate().0, c.max_sample_rate().0);
            let distance = if (min..=max).contains(&target_rate) {
                0
            } else {
                min.abs_diff(target_rate).min(max.abs_diff(target_rate))
            };
            (c.channels() != 1, distance)
        })
}
