//! # Ring Buffer Module
//!
//! A fixed-capacity circular store of mono samples shared between a sample
//! producer (audio callback or producer thread) and a periodic consumer.
//!
//! ## Guarantees
//! - The least recently written sample always sits at the write cursor
//! - Snapshots are ordered oldest to newest and owned by the caller
//! - A batch passed to `write` is never observed half-written
//! - Both sides hold the lock only for an O(capacity) copy

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::warn;

#[derive(Debug)]
struct Inner {
    samples: Vec<f32>,
    cursor: usize,
    written: u64,
}

/// Circular sample store guarded by a single mutex.
///
/// Share it between threads with `Arc<RingBuffer>`; neither side ever sees
/// the cursor.
#[derive(Debug)]
pub struct RingBuffer {
    inner: Mutex<Inner>,
    capacity: usize,
}

impl RingBuffer {
    /// Creates a zero-filled buffer.
    ///
    /// # Panics
    /// * If `capacity` is zero
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring buffer capacity must be positive");
        Self {
            inner: Mutex::new(Inner {
                samples: vec![0.0; capacity],
                cursor: 0,
                written: 0,
            }),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total number of samples appended since creation.
    pub fn samples_written(&self) -> u64 {
        self.lock().written
    }

    /// Appends `frames` in order, overwriting the oldest samples.
    pub fn write(&self, frames: &[f32]) {
        let mut inner = self.lock();
        for &sample in frames {
            inner.push(sample);
        }
    }

    /// Appends the first channel of interleaved `channels`-wide frames.
    ///
    /// A trailing partial frame still contributes its first sample.
    pub fn write_interleaved(&self, data: &[f32], channels: usize) {
        if channels <= 1 {
            self.write(data);
            return;
        }
        let mut inner = self.lock();
        for frame in data.chunks(channels) {
            inner.push(frame[0]);
        }
    }

    /// Returns all `capacity` samples, oldest first.
    pub fn snapshot(&self) -> Vec<f32> {
        let mut out = vec![0.0; self.capacity];
        self.snapshot_into(&mut out);
        out
    }

    /// Copies all samples, oldest first, into `out` without allocating.
    ///
    /// # Panics
    /// * If `out.len()` differs from the capacity
    pub fn snapshot_into(&self, out: &mut [f32]) {
        assert_eq!(out.len(), self.capacity, "snapshot target must match capacity");
        let inner = self.lock();
        let (newer, older) = inner.samples.split_at(inner.cursor);
        out[..older.len()].copy_from_slice(older);
        out[older.len()..].copy_from_slice(newer);
    }

    /// Returns the newest `n` samples, oldest first.
    ///
    /// # Panics
    /// * If `n` exceeds the capacity
    pub fn latest(&self, n: usize) -> Vec<f32> {
        assert!(n <= self.capacity, "requested {n} samples from a buffer of {}", self.capacity);
        let mut out = Vec::with_capacity(n);
        let inner = self.lock();
        let start = (inner.cursor + self.capacity - n) % self.capacity;
        if start + n <= self.capacity {
            out.extend_from_slice(&inner.samples[start..start + n]);
        } else {
            out.extend_from_slice(&inner.samples[start..]);
            out.extend_from_slice(&inner.samples[..start + n - self.capacity]);
        }
        out
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panicking writer cannot leave the samples in an unusable state.
        self.inner.lock().unwrap_or_else(|poisoned: PoisonError<_>| {
            warn!("ring buffer lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

impl Inner {
    fn push(&mut self, sample: f32) {
        let cursor = self.cursor;
        self.samples[cursor] = sample;
        self.cursor = (cursor + 1) % self.samples.len();
        self.written += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn starts_zeroed_and_full_length() {
        let buffer = RingBuffer::new(8);
        assert_eq!(buffer.snapshot(), vec![0.0; 8]);

        buffer.write(&[1.0, 2.0, 3.0]);
        assert_eq!(buffer.snapshot(), vec![0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 2.0, 3.0]);
        assert_eq!(buffer.samples_written(), 3);
    }

    #[test]
    fn wraps_oldest_to_newest() {
        let buffer = RingBuffer::new(4);
        buffer.write(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(buffer.snapshot(), vec![3.0, 4.0, 5.0, 6.0]);

        // Exactly one full lap puts the cursor back at zero.
        buffer.write(&[7.0, 8.0]);
        assert_eq!(buffer.snapshot(), vec![5.0, 6.0, 7.0, 8.0]);
    }

    #[test]
    fn snapshot_is_idempotent_without_writes() {
        let buffer = RingBuffer::new(5);
        buffer.write(&[0.5, -0.5, 0.25, 1.0, -1.0, 0.75]);
        let first = buffer.snapshot();
        assert_eq!(buffer.snapshot(), first);
        assert_eq!(buffer.snapshot(), first);
    }

    #[test]
    fn snapshot_is_detached_from_later_writes() {
        let buffer = RingBuffer::new(3);
        buffer.write(&[1.0, 2.0, 3.0]);
        let snapshot = buffer.snapshot();
        buffer.write(&[9.0]);
        assert_eq!(snapshot, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn latest_returns_newest_suffix() {
        let buffer = RingBuffer::new(5);
        buffer.write(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
        assert_eq!(buffer.latest(3), vec![5.0, 6.0, 7.0]);
        assert_eq!(buffer.latest(5), buffer.snapshot());
        assert!(buffer.latest(0).is_empty());
    }

    #[test]
    fn interleaved_keeps_first_channel() {
        let buffer = RingBuffer::new(3);
        buffer.write_interleaved(&[1.0, -1.0, 2.0, -2.0, 3.0, -3.0], 2);
        assert_eq!(buffer.snapshot(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    #[should_panic]
    fn snapshot_into_rejects_wrong_length() {
        let buffer = RingBuffer::new(4);
        let mut out = [0.0; 3];
        buffer.snapshot_into(&mut out);
    }

    #[test]
    fn concurrent_reader_never_sees_torn_batches() {
        const BATCH: usize = 64;
        const BATCHES: usize = 2000;
        let buffer = RingBuffer::new(256);
        let done = AtomicBool::new(false);

        std::thread::scope(|scope| {
            scope.spawn(|| {
                let mut next = 1.0_f32;
                for _ in 0..BATCHES {
                    let batch: Vec<f32> = (0..BATCH)
                        .map(|_| {
                            let value = next;
                            next += 1.0;
                            value
                        })
                        .collect();
                    buffer.write(&batch);
                }
                done.store(true, Ordering::SeqCst);
            });

            while !done.load(Ordering::SeqCst) {
                let snapshot = buffer.snapshot();
                // The written suffix must be a run of consecutive counters
                // ending on a batch boundary.
                let filled: Vec<f32> = snapshot.into_iter().filter(|&s| s != 0.0).collect();
                for pair in filled.windows(2) {
                    assert_eq!(pair[1], pair[0] + 1.0);
                }
                if let Some(&last) = filled.last() {
                    assert_eq!(last as usize % BATCH, 0);
                }
            }
        });

        assert_eq!(buffer.samples_written(), (BATCH * BATCHES) as u64);
    }
}
