//! Build-time capture constants.
//!
//! `CaptureConfig::default()` is assembled from these values. They describe a
//! 16 kHz mono microphone delivering audio in 512-sample chunks.

/// Sampling frequency of the Sample Clock (Hz).
pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;

/// Samples captured between two timestamp advances on the live path.
///
/// 512 samples at 16 kHz = 32 ms per chunk.
pub const DEFAULT_CHUNK_SAMPLES: usize = 512;

/// Ring capacity expressed in chunks: 32 × 512 = 16 384 samples ≈ 1 s.
pub const DEFAULT_RING_CHUNKS: usize = 32;

/// Largest window a consumer may request, in milliseconds.
pub const DEFAULT_MAX_WINDOW_MS: u64 = 1_024;

/// Largest ring `CaptureConfig::validate` accepts: 2^24 samples, about
/// 17 minutes at 16 kHz. Bounds the window buffer too.
pub const MAX_RING_SAMPLES: usize = 1 << 24;

/// Largest ready FIFO `CaptureConfig::validate` accepts.
pub const MAX_FIFO_CAPACITY: usize = 1 << 20;

/// Slots in the SPSC FIFO between the Sample Source and the polling driver.
pub const DEFAULT_FIFO_CAPACITY: usize = 64;

/// `calibrate()` polls before the source is declared unreachable.
pub const DEFAULT_CALIBRATION_ATTEMPTS: u32 = 200;

/// Bootstrap polls `init_capture` makes while waiting for the first chunk.
pub const DEFAULT_BOOTSTRAP_ATTEMPTS: u32 = 3_000;

/// Pause between bounded-wait polls once the initial spin phase is over.
pub const DEFAULT_WAIT_BACKOFF_MS: u64 = 1;

/// Silence appended after every test submission cycle while no stream is open.
pub const TEST_SILENCE_MS: u64 = 16;

/// Test-mode timestamps are floored to a multiple of this many milliseconds.
pub const TEST_TIMESTAMP_QUANTUM_MS: u64 = TEST_SILENCE_MS * 4;
