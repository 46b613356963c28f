//! Capture configuration.
//!
//! Every size in the core is derived from `CaptureConfig` once, when the
//! provider is built. Nothing is resized afterwards.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BOOTSTRAP_ATTEMPTS, DEFAULT_CALIBRATION_ATTEMPTS, DEFAULT_CHUNK_SAMPLES,
    DEFAULT_FIFO_CAPACITY, DEFAULT_MAX_WINDOW_MS, DEFAULT_RING_CHUNKS, DEFAULT_SAMPLE_RATE,
    DEFAULT_WAIT_BACKOFF_MS, MAX_FIFO_CAPACITY, MAX_RING_SAMPLES, TEST_SILENCE_MS,
    TEST_TIMESTAMP_QUANTUM_MS,
};
use crate::error::{CaptureError, Result};

/// Which capture driver fills the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureStrategy {
    /// Samples are copied straight from the source completion context.
    Immediate,
    /// A dedicated thread runs the four-state capture loop and busy-polls
    /// the source's ready FIFO.
    Polling,
}

/// Configuration for `AudioProvider`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct CaptureConfig {
    /// Sample Clock frequency (Hz). Must be a whole number of kHz.
    pub sample_rate: u32,
    /// Samples per chunk. Must be a whole number of milliseconds.
    pub chunk_samples: usize,
    /// Ring capacity in chunks.
    pub ring_chunks: usize,
    /// Largest window `get_window` will serve (ms).
    pub max_window_ms: u64,
    /// Capture driver variant.
    pub strategy: CaptureStrategy,
    /// Slots in the ready FIFO used by the polling driver.
    pub fifo_capacity: usize,
    /// Calibration polls before `init_capture` gives up.
    pub calibration_attempts: u32,
    /// First-chunk polls before `init_capture` gives up.
    pub bootstrap_attempts: u32,
    /// Pause between bounded-wait polls (ms).
    pub wait_backoff_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            chunk_samples: DEFAULT_CHUNK_SAMPLES,
            ring_chunks: DEFAULT_RING_CHUNKS,
            max_window_ms: DEFAULT_MAX_WINDOW_MS,
            strategy: CaptureStrategy::Immediate,
            fifo_capacity: DEFAULT_FIFO_CAPACITY,
            calibration_attempts: DEFAULT_CALIBRATION_ATTEMPTS,
            bootstrap_attempts: DEFAULT_BOOTSTRAP_ATTEMPTS,
            wait_backoff_ms: DEFAULT_WAIT_BACKOFF_MS,
        }
    }
}

impl CaptureConfig {
    pub fn samples_per_ms(&self) -> usize {
        (self.sample_rate / 1000) as usize
    }

    /// Milliseconds of audio in one chunk.
    pub fn chunk_ms(&self) -> u64 {
        (self.chunk_samples / self.samples_per_ms().max(1)) as u64
    }

    /// Ring capacity in samples.
    pub fn ring_capacity(&self) -> usize {
        self.chunk_samples * self.ring_chunks
    }

    /// Ring capacity in milliseconds: the oldest audio still recoverable.
    pub fn capacity_ms(&self) -> u64 {
        self.chunk_ms() * self.ring_chunks as u64
    }

    pub fn max_window_samples(&self) -> usize {
        self.max_window_ms as usize * self.samples_per_ms()
    }

    /// Zero samples appended per idle test submission cycle.
    pub fn test_silence_samples(&self) -> usize {
        TEST_SILENCE_MS as usize * self.samples_per_ms()
    }

    /// Samples per test-mode timestamp step.
    pub fn test_quantum_samples(&self) -> u64 {
        TEST_TIMESTAMP_QUANTUM_MS * self.samples_per_ms() as u64
    }

    pub fn wait_backoff(&self) -> Duration {
        Duration::from_millis(self.wait_backoff_ms)
    }

    /// Check the structural invariants every other module relies on.
    ///
    /// The size accessors above do unchecked arithmetic; they are only
    /// meaningful once this has returned `Ok`.
    ///
    /// # Errors
    /// Returns `CaptureError::InvalidConfig` naming the first violated rule.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate < 1000 || self.sample_rate % 1000 != 0 {
            return Err(CaptureError::InvalidConfig(format!(
                "sample rate {} Hz is not a whole number of kHz",
                self.sample_rate
            )));
        }
        let spm = self.samples_per_ms();
        if self.chunk_samples == 0 || self.chunk_samples % spm != 0 {
            return Err(CaptureError::InvalidConfig(format!(
                "chunk of {} samples is not a whole number of milliseconds at {} Hz",
                self.chunk_samples, self.sample_rate
            )));
        }
        if self.ring_chunks == 0 {
            return Err(CaptureError::InvalidConfig(
                "ring must hold at least one chunk".into(),
            ));
        }
        let ring_samples = self
            .chunk_samples
            .checked_mul(self.ring_chunks)
            .filter(|&n| n <= MAX_RING_SAMPLES)
            .ok_or_else(|| {
                CaptureError::InvalidConfig(format!(
                    "ring of {} × {} samples exceeds the {MAX_RING_SAMPLES}-sample limit",
                    self.ring_chunks, self.chunk_samples
                ))
            })?;
        let window_samples = usize::try_from(self.max_window_ms)
            .ok()
            .and_then(|ms| ms.checked_mul(spm));
        match window_samples {
            Some(n) if self.max_window_ms > 0 && n <= ring_samples => {}
            _ => {
                return Err(CaptureError::InvalidConfig(format!(
                    "max window of {} ms must be non-zero and fit the {} ms ring",
                    self.max_window_ms,
                    ring_samples / spm
                )))
            }
        }
        if self.fifo_capacity == 0 || self.fifo_capacity > MAX_FIFO_CAPACITY {
            return Err(CaptureError::InvalidConfig(format!(
                "ready FIFO of {} slots must be between 1 and {MAX_FIFO_CAPACITY}",
                self.fifo_capacity
            )));
        }
        if self.calibration_attempts == 0 || self.bootstrap_attempts == 0 {
            return Err(CaptureError::InvalidConfig(
                "bounded waits need at least one attempt".into(),
            ));
        }
        Ok(())
    }
}
