use std::sync::atomic::{AtomicU64, Ordering};

/// Informational counters. None of them drive control flow.
#[derive(Debug, Default)]
pub struct CaptureDiagnostics {
    pub chunks_captured: AtomicU64,
    pub samples_captured: AtomicU64,
    /// Samples the ready FIFO refused because the polling driver fell behind.
    pub fifo_overruns: AtomicU64,
    pub test_chunks: AtomicU64,
    pub test_samples: AtomicU64,
    pub silence_blocks: AtomicU64,
}

impl CaptureDiagnostics {
    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            chunks_captured: self.chunks_captured.load(Ordering::Relaxed),
            samples_captured: self.samples_captured.load(Ordering::Relaxed),
            fifo_overruns: self.fifo_overruns.load(Ordering::Relaxed),
            test_chunks: self.test_chunks.load(Ordering::Relaxed),
            test_samples: self.test_samples.load(Ordering::Relaxed),
            silence_blocks: self.silence_blocks.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiagnosticsSnapshot {
    pub chunks_captured: u64,
    pub samples_captured: u64,
    pub fifo_overruns: u64,
    pub test_chunks: u64,
    pub test_samples: u64,
    pub silence_blocks: u64,
}

