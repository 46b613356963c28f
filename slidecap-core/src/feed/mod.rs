//! Test-injection feed.
//!
//! In test mode, framed chunks from the command channel replace the Sample
//! Source. They are written into the same ring, and the timestamp follows
//! the test-mode rules:
//!
//! 1. A chunk with `offset == 0` opens a stream and suppresses silence.
//! 2. A chunk with `offset + length == total` closes it and re-enables silence.
//! 3. After every submission cycle, while silence is enabled, 16 ms of zeros
//!    are appended, just as an idle microphone would keep producing.
//! 4. The timestamp is the cursor floored to a multiple of 64 ms.

pub mod command;
pub mod stream;

pub use command::{command_channel, ChannelCommands, CommandSource, FeedCommand, NoCommands};
pub use stream::frame_stream;

use std::sync::{atomic::Ordering, Arc};

use tracing::debug;

use crate::buffering::ring::{CaptureRing, RingWriter};
use crate::config::CaptureConfig;
use crate::constants::TEST_TIMESTAMP_QUANTUM_MS;
use crate::engine::diagnostics::CaptureDiagnostics;
use crate::error::{CaptureError, Result};

/// One framed piece of a logical test stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestChunk {
    offset: u32,
    total: u32,
    samples: Vec<i16>,
}

impl TestChunk {
    /// # Errors
    /// `CaptureError::InvalidTestChunk` when the chunk would run past `total`.
    pub fn new(offset: u32, total: u32, samples: Vec<i16>) -> Result<Self> {
        let end = offset as u64 + samples.len() as u64;
        if end > total as u64 {
            return Err(CaptureError::InvalidTestChunk(format!(
                "offset {offset} + length {} exceeds total {total}",
                samples.len()
            )));
        }
        Ok(Self {
            offset,
            total,
            samples,
        })
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn length(&self) -> u32 {
        self.samples.len() as u32
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn opens_stream(&self) -> bool {
        self.offset == 0
    }

    pub fn completes_stream(&self) -> bool {
        self.offset as u64 + self.samples.len() as u64 == self.total as u64
    }
}

/// Alternate producer used once the provider is in test mode.
pub struct TestFeed {
    writer: RingWriter,
    insert_silence: bool,
    silence_samples: usize,
    quantum_samples: u64,
    diagnostics: Arc<CaptureDiagnostics>,
}

impl TestFeed {
    /// Create a feed whose first sample lands at absolute index `start`.
    pub fn new(
        ring: Arc<CaptureRing>,
        start: u64,
        config: &CaptureConfig,
        diagnostics: Arc<CaptureDiagnostics>,
    ) -> Self {
        Self {
            writer: RingWriter::new(ring, start),
            insert_silence: true,
            silence_samples: config.test_silence_samples(),
            quantum_samples: config.test_quantum_samples().max(1),
            diagnostics,
        }
    }

    /// Write one chunk at the test cursor.
    pub fn submit_chunk(&mut self, chunk: &TestChunk) {
        if chunk.opens_stream() {
            self.insert_silence = false;
        }

        self.writer.write_slice(chunk.samples());
        self.diagnostics.test_chunks.fetch_add(1, Ordering::Relaxed);
        self.diagnostics
            .test_samples
            .fetch_add(chunk.samples().len() as u64, Ordering::Relaxed);

        if chunk.completes_stream() {
            self.insert_silence = true;
        }
        debug!(
            offset = chunk.offset(),
            length = chunk.length(),
            total = chunk.total(),
            cursor = self.writer.cursor(),
            "test chunk written"
        );
    }

    /// Close a submission cycle: pad with silence if no stream is open, then
    /// return the quantized timestamp.
    pub fn finish_cycle(&mut self) -> u64 {
        if self.insert_silence {
            self.writer.fill(0, self.silence_samples);
            self.diagnostics
                .silence_blocks
                .fetch_add(1, Ordering::Relaxed);
        }
        self.quantized_timestamp()
    }

    /// `floor(cursor / samples_per_64ms) * 64`.
    pub fn quantized_timestamp(&self) -> u64 {
        (self.writer.cursor() / self.quantum_samples) * TEST_TIMESTAMP_QUANTUM_MS
    }

    pub fn cursor(&self) -> u64 {
        self.writer.cursor()
    }

    pub fn inserts_silence(&self) -> bool {
        self.insert_silence
    }
}
