//! Window reads: `(start_ms, duration_ms)` → samples.

use std::sync::Arc;

use super::ring::CaptureRing;
use crate::error::{CaptureError, Result};

/// Converts millisecond windows into ring reads and owns the output buffer.
///
/// The output buffer is allocated once. The returned slice borrows it, so it
/// stays valid until the next `read` call.
pub struct WindowReader {
    ring: Arc<CaptureRing>,
    samples_per_ms: usize,
    out: Box<[i16]>,
}

impl WindowReader {
    pub fn new(ring: Arc<CaptureRing>, samples_per_ms: usize, max_window_samples: usize) -> Self {
        Self {
            ring,
            samples_per_ms,
            out: vec![0i16; max_window_samples].into_boxed_slice(),
        }
    }

    /// Copy `duration_ms` of audio starting `start_ms` after capture start.
    ///
    /// # Errors
    /// `CaptureError::WindowTooLarge` when the window exceeds the
    /// preallocated output capacity. Overwritten data is not an error.
    pub fn read(&mut self, start_ms: u64, duration_ms: u64) -> Result<&[i16]> {
        let capacity = self.out.len();
        let count = usize::try_from(duration_ms)
            .ok()
            .and_then(|ms| ms.checked_mul(self.samples_per_ms))
            .filter(|&count| count <= capacity)
            .ok_or(CaptureError::WindowTooLarge {
                requested: (duration_ms as usize).saturating_mul(self.samples_per_ms),
                capacity,
            })?;

        let start_abs_index = start_ms.saturating_mul(self.samples_per_ms as u64);
        let window = &mut self.out[..count];
        self.ring.read_range(start_abs_index, window);
        Ok(window)
    }
}
