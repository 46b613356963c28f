//! # slidecap-core
//!
//! Sliding-window audio capture for a single consumer.
//!
//! ## Architecture
//!
//! ```text
//! SampleClock → SampleSource ─┬─ ImmediateSink ──────────────────┐
//!                             └─ SPSC FIFO → capture thread ─────┤
//!                                                                ▼
//! test command channel → TestFeed ──────────────────────► CaptureRing ─► WindowReader
//!                                                                │
//!                                                    Timeline (latest ms)
//! ```
//!
//! The sample path is lock-free and allocation-free. All allocation happens
//! when the `AudioProvider` is built.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod audio;
pub mod buffering;
pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod feed;
pub mod ipc;

// Convenience re-exports for downstream crates
pub use audio::{CaptureHardware, Pacing, SampleClock, SampleSink, SampleSource, SimulatedSource, Waveform};
pub use config::{CaptureConfig, CaptureStrategy};
pub use engine::AudioProvider;
pub use error::CaptureError;
pub use feed::{command_channel, CommandSource, FeedCommand, NoCommands, TestChunk};
pub use ipc::events::{CaptureMode, CapturePhase, CaptureStatusEvent};

#[cfg(feature = "audio-cpal")]
pub use audio::CpalSource;
