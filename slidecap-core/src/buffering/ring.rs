//! Fixed-capacity history ring addressed by absolute sample index.
//!
//! Unlike the ready FIFO, reads never consume anything: the consumer asks for
//! any absolute index and gets whatever currently occupies
//! `index % capacity`. Each slot is an `AtomicI16`, so a sample is always
//! written by one indivisible store and a reader can never observe half of
//! one. Ordering between the writer and reader is carried by the timeline's
//! release/acquire pair, so the slots themselves use `Relaxed`.

use std::sync::atomic::{AtomicI16, Ordering};
use std::sync::Arc;

/// Shared sample storage. Written through a [`RingWriter`], read via
/// [`CaptureRing::read_range`].
pub struct CaptureRing {
    slots: Box<[AtomicI16]>,
}

impl CaptureRing {
    /// Allocate a zero-filled ring. This is the only allocation the ring ever makes.
    pub fn new(capacity: usize) -> Self {
        let slots = (0..capacity.max(1))
            .map(|_| AtomicI16::new(0))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self { slots }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    fn slot_index(&self, abs_index: u64) -> usize {
        (abs_index % self.slots.len() as u64) as usize
    }

    #[inline]
    fn store(&self, abs_index: u64, sample: i16) {
        self.slots[self.slot_index(abs_index)].store(sample, Ordering::Relaxed);
    }

    /// Copy `out.len()` samples starting at absolute index `start_abs_index`.
    ///
    /// No staleness check: if the writer has lapped `start_abs_index`, the
    /// newer samples occupying those slots are returned.
    pub fn read_range(&self, start_abs_index: u64, out: &mut [i16]) {
        let cap = self.slots.len();
        let mut pos = self.slot_index(start_abs_index);
        for dst in out.iter_mut() {
            *dst = self.slots[pos].load(Ordering::Relaxed);
            pos += 1;
            if pos == cap {
                pos = 0;
            }
        }
    }
}

impl std::fmt::Debug for CaptureRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureRing")
            .field("capacity", &self.capacity())
            .finish_non_exhaustive()
    }
}

/// The single write handle to a [`CaptureRing`].
///
/// Owns the write cursor: the absolute index of the next sample. Not `Clone`,
/// so at most one context writes through a given handle. The live driver and
/// the test feed each own their own writer, and they are never active at the
/// same time.
#[derive(Debug)]
pub struct RingWriter {
    ring: Arc<CaptureRing>,
    cursor: u64,
}

impl RingWriter {
    /// Create a writer whose first sample lands at absolute index `start`.
    pub fn new(ring: Arc<CaptureRing>, start: u64) -> Self {
        Self { ring, cursor: start }
    }

    /// Store one sample at the cursor and advance it. O(1), never blocks.
    #[inline]
    pub fn write(&mut self, sample: i16) {
        self.ring.store(self.cursor, sample);
        self.cursor += 1;
    }

    pub fn write_slice(&mut self, samples: &[i16]) {
        for &sample in samples {
            self.write(sample);
        }
    }

    /// Write `len` copies of `value`.
    pub fn fill(&mut self, value: i16, len: usize) {
        for _ in 0..len {
            self.write(value);
        }
    }

    /// Total samples written through this handle plus its start offset.
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Position of the cursor inside the ring.
    pub fn write_index(&self) -> usize {
        self.ring.slot_index(self.cursor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring_with_writer(capacity: usize) -> (Arc<CaptureRing>, RingWriter) {
        let ring = Arc::new(CaptureRing::new(capacity));
        let writer = RingWriter::new(Arc::clone(&ring), 0);
        (ring, writer)
    }

    #[test]
    fn sub_ranges_of_recent_writes_read_back_in_order() {
        let (ring, mut writer) = ring_with_writer(64);
        let written: Vec<i16> = (0..50).map(|i| i * 3 - 70).collect();
        writer.write_slice(&written);

        for start in [0usize, 1, 17, 49] {
            for len in [0usize, 1, 50 - start] {
                let mut out = vec![0i16; len];
                ring.read_range(start as u64, &mut out);
                assert_eq!(out, &written[start..start + len], "start={start} len={len}");
            }
        }
    }

    #[test]
    fn cursor_wraps_modulo_capacity() {
        let (_ring, mut writer) = ring_with_writer(8);
        writer.fill(1, 11);
        assert_eq!(writer.cursor(), 11);
        assert_eq!(writer.write_index(), 3);
    }

    #[test]
    fn read_across_wrap_boundary_has_no_gap_or_duplicate() {
        let (ring, mut writer) = ring_with_writer(8);
        writer.write_slice(&[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);

        let mut out = [0i16; 8];
        ring.read_range(3, &mut out);
        assert_eq!(out, [3, 4, 5, 6, 7, 8, 9, 10]);
    }

    #[test]
    fn lapped_indices_return_newer_samples() {
        let (ring, mut writer) = ring_with_writer(4);
        writer.write_slice(&[10, 11, 12, 13, 14]);

        let mut out = [0i16; 1];
        ring.read_range(0, &mut out);
        assert_eq!(out, [14]);
    }

    #[test]
    fn writer_seeded_past_zero_lands_at_seed() {
        let ring = Arc::new(CaptureRing::new(16));
        let mut writer = RingWriter::new(Arc::clone(&ring), 21);
        writer.write(-7);

        let mut out = [0i16; 1];
        ring.read_range(21, &mut out);
        assert_eq!(out, [-7]);
        assert_eq!(writer.cursor(), 22);
    }
}
