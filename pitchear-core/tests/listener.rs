use std::thread;
use std::time::Duration;

use pitchear_core::source::{SampleSource, SilenceSource, SineSource, spawn_producer};
use pitchear_core::{DifferenceMethod, Listener, ListenerConfig, PitchTable, Reading};

const SAMPLE_RATE: f32 = 44100.0;

fn config(window_size: usize, buffer_capacity: usize) -> ListenerConfig {
    ListenerConfig {
        sample_rate: SAMPLE_RATE,
        window_size,
        buffer_capacity,
        ..Default::default()
    }
}

/// Feeds `windows` consecutive windows of `source` through the listener,
/// reading once after each.
fn feed(listener: &mut Listener, source: &mut impl SampleSource, windows: usize) -> Vec<Reading> {
    let mut frame = vec![0.0; listener.config().window_size];
    (0..windows)
        .map(|_| {
            source.fill(&mut frame);
            listener.buffer().write(&frame);
            listener.listen()
        })
        .collect()
}

#[test]
fn converges_on_a4_within_two_windows() {
    let mut listener = Listener::new(config(1024, 1024), PitchTable::piano()).unwrap();
    let mut sine = SineSource::new(440.0, 0.7, SAMPLE_RATE);
    let readings = feed(&mut listener, &mut sine, 6);

    for reading in &readings[1..] {
        assert!(
            (reading.frequency - 440.0).abs() < 4.4,
            "estimate {} Hz is not within 1% of 440 Hz",
            reading.frequency
        );
        assert!(reading.confidence > 0.9);
        assert_eq!(reading.pitch.name, "A4");
        assert!(reading.cents.abs() < 17.0);
    }
    for pair in readings[1..].windows(2) {
        assert!((pair[0].frequency - pair[1].frequency).abs() < 2.2, "unstable: {pair:?}");
    }
}

#[test]
fn larger_buffer_uses_newest_window() {
    let mut listener = Listener::new(config(1024, 4096), PitchTable::flute()).unwrap();
    let mut low = SineSource::new(523.25, 0.7, SAMPLE_RATE);
    let mut high = SineSource::new(783.99, 0.7, SAMPLE_RATE);

    let readings = feed(&mut listener, &mut low, 4);
    assert_eq!(readings[3].pitch.name, "c");

    // Only the newest 1024 samples matter once the tone changes.
    let readings = feed(&mut listener, &mut high, 1);
    assert_eq!(readings[0].pitch.name, "g");
}

#[test]
fn fft_difference_end_to_end() {
    let config = ListenerConfig { difference: DifferenceMethod::Fft, ..config(2048, 4096) };
    let mut listener = Listener::new(config, PitchTable::flute()).unwrap();
    let mut sine = SineSource::new(1396.91, 0.5, SAMPLE_RATE);
    let readings = feed(&mut listener, &mut sine, 2);
    assert_eq!(readings[1].pitch.name, "f'");
    assert!(readings[1].confidence > 0.95);
}

#[test]
fn silence_reads_as_pause() {
    let mut listener = Listener::new(config(1024, 2048), PitchTable::flute()).unwrap();
    let readings = feed(&mut listener, &mut SilenceSource, 3);
    for reading in readings {
        assert_eq!((reading.frequency, reading.confidence), (-1.0, 0.0));
        assert!(reading.pitch.is_pause());
        assert_eq!(reading.index, 0);
    }
}

#[test]
fn producer_thread_and_frame_loop() {
    let mut listener = Listener::new(config(2048, 4096), PitchTable::flute()).unwrap();
    let buffer = listener.buffer();
    let producer = spawn_producer(
        SineSource::new(659.25, 0.5, SAMPLE_RATE),
        listener.buffer(),
        512,
        Duration::from_millis(1),
    )
    .unwrap();

    while buffer.samples_written() < buffer.capacity() as u64 {
        thread::sleep(Duration::from_millis(1));
    }

    // A few frames of the caller's loop while the producer keeps writing.
    for _ in 0..5 {
        let reading = listener.listen();
        assert_eq!(reading.pitch.name, "e");
        assert!(reading.confidence > 0.9);
        thread::sleep(Duration::from_millis(2));
    }

    assert!(producer.stop() >= 8);
}
