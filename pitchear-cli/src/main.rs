//! # pitchear - terminal pitch listener
//!
//! A headless stand-in for a frame-rate-driven caller such as a game loop.
//!
//! ## Architecture
//! - **Producer**: the cpal input callback, or a synthetic sine thread with `--synth`
//! - **Consumer**: this thread, ticking at `--fps` and calling `Listener::listen`
//! - **Shared state**: only the listener's ring buffer
//!
//! Readings go to stdout (text or JSON lines), logs go to stderr.

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use clap::{Parser, ValueEnum};
use cpal::traits::StreamTrait;
use pitchear_core::source::{ProducerHandle, SineSource, spawn_producer};
use pitchear_core::{DifferenceMethod, Listener, ListenerConfig, PitchTable, Reading, audio};
use tracing::{Level, info};

/// Samples per write of the synthetic producer.
const SYNTH_FRAME: usize = 512;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TableChoice {
    /// Two chromatic octaves from C5 (flute range)
    Flute,
    /// The 88 keys of a piano
    Piano,
}

#[derive(Debug, Parser)]
#[command(name = "pitchear", version, about = "Listen to a monophonic signal and name its pitch")]
struct Args {
    /// JSON listener configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Built-in pitch table
    #[arg(long, value_enum, default_value_t = TableChoice::Flute)]
    table: TableChoice,

    /// JSON array of pitches, replaces --table
    #[arg(long)]
    table_file: Option<PathBuf>,

    /// Override the detection threshold
    #[arg(long)]
    threshold: Option<f32>,

    /// Compute the difference function with an FFT
    #[arg(long)]
    fft: bool,

    /// Listen to a synthetic sine of this frequency instead of the microphone
    #[arg(long, value_name = "HZ")]
    synth: Option<f32>,

    /// Readings per second
    #[arg(long, default_value_t = 60.0)]
    fps: f64,

    /// Stop after this many readings
    #[arg(long)]
    frames: Option<u64>,

    /// Print readings as JSON lines
    #[arg(long)]
    json: bool,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Whatever keeps samples flowing into the listener's buffer.
enum Capture {
    Device(cpal::Stream),
    Synth(ProducerHandle),
}

impl Capture {
    fn stop(self) -> Result<()> {
        match self {
            Capture::Device(stream) => stream.pause().context("Failed to stop the input stream")?,
            Capture::Synth(producer) => {
                let frames = producer.stop();
                info!(frames, "synthetic producer stopped");
            }
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    ensure!(args.fps.is_finite() && args.fps > 0.0, "--fps must be positive");

    let mut config = match &args.config {
        Some(path) => ListenerConfig::from_json_file(path)?,
        None => ListenerConfig::default(),
    };
    if let Some(threshold) = args.threshold {
        config.threshold = threshold;
    }
    if args.fft {
        config.difference = DifferenceMethod::Fft;
    }

    let table = match &args.table_file {
        Some(path) => PitchTable::from_json_file(path)?,
        None => match args.table {
            TableChoice::Flute => PitchTable::flute(),
            TableChoice::Piano => PitchTable::piano(),
        },
    };

    let (mut listener, capture) = match args.synth {
        Some(frequency) => {
            let listener = Listener::new(config, table)?;
            let sample_rate = listener.config().sample_rate;
            let producer = spawn_producer(
                SineSource::new(frequency, 0.5, sample_rate),
                listener.buffer(),
                SYNTH_FRAME,
                Duration::from_secs_f64(SYNTH_FRAME as f64 / f64::from(sample_rate)),
            )
            .context("Failed to start the synthetic producer")?;
            info!(frequency, "listening to a synthetic sine");
            (listener, Capture::Synth(producer))
        }
        None => {
            let input = audio::select_input(config.sample_rate.round() as u32)?;
            config.sample_rate = input.sample_rate() as f32;
            let listener = Listener::new(config, table)?;
            let stream = audio::start_capture(&input, listener.buffer())?;
            (listener, Capture::Device(stream))
        }
    };

    run_frame_loop(&mut listener, &args)?;
    capture.stop()
}

/// Calls the listener once per tick and prints each reading.
fn run_frame_loop(listener: &mut Listener, args: &Args) -> Result<()> {
    let ticker = crossbeam_channel::tick(Duration::from_secs_f64(1.0 / args.fps));
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut frames = 0u64;

    info!(fps = args.fps, window = listener.config().window_size, "entering frame loop");
    loop {
        ticker.recv().context("Frame ticker stopped")?;
        let reading = listener.listen();
        if args.json {
            writeln!(out, "{}", serde_json::to_string(&reading)?)?;
        } else {
            writeln!(out, "{}", format_reading(&reading))?;
        }

        frames += 1;
        if args.frames.is_some_and(|limit| frames >= limit) {
            break;
        }
    }
    out.flush()?;
    Ok(())
}

fn format_reading(reading: &Reading) -> String {
    if !reading.is_pitched() {
        return format!("{:>4}  {:>9}", "-", "silence");
    }
    format!(
        "{:>4}  {:>9.2} Hz  {:>+6.1} cents  confidence {:.3}",
        reading.pitch.title(),
        reading.frequency,
        reading.cents,
        reading.confidence
    )
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_thread_names(true)
        .with_target(false)
        .init();
}
