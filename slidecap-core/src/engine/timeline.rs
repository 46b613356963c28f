//! The latest-timestamp counter shared by the writer and the consumer.

use std::sync::atomic::{AtomicU64, Ordering};

/// Milliseconds of audio captured so far, advanced only in whole chunks.
///
/// This is the only location the consumer polls to learn how much new data
/// exists. The writer publishes with `Release` after the chunk's samples are
/// stored; the consumer loads with `Acquire`, so every sample below the
/// published timestamp is visible to it.
#[derive(Debug, Default)]
pub struct Timeline {
    latest_ms: AtomicU64,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest_ms(&self) -> u64 {
        self.latest_ms.load(Ordering::Acquire)
    }

    /// Advance by one chunk's worth of milliseconds. Writer side only.
    pub fn advance(&self, chunk_ms: u64) -> u64 {
        self.latest_ms.fetch_add(chunk_ms, Ordering::AcqRel) + chunk_ms
    }

    /// Publish a recomputed timestamp, never moving backwards.
    ///
    /// Returns the timestamp in effect afterwards.
    pub fn publish(&self, ms: u64) -> u64 {
        self.latest_ms.fetch_max(ms, Ordering::AcqRel).max(ms)
    }
}
