//! Hardware abstraction: the Sample Clock / Sample Source pair.
//!
//! # Completion context
//!
//! A source calls [`SampleSink::on_sample`] from whatever context signals
//! "conversion done": a timer thread for [`simulated::SimulatedSource`], the
//! OS audio callback for the cpal backend. That context is the analogue of an
//! interrupt handler. Sinks **must not**:
//! - Allocate heap memory
//! - Block on a mutex or condvar
//! - Perform I/O
//!
//! Both sinks the capture drivers install satisfy that contract: one stores
//! into the atomic ring, the other pushes into a wait-free SPSC FIFO.

pub mod resample;
pub mod simulated;
pub mod wav;

#[cfg(feature = "audio-cpal")]
pub mod cpal_source;

#[cfg(feature = "audio-cpal")]
pub use cpal_source::{list_input_devices, CpalSource};

pub use simulated::{Pacing, SimulatedProbe, SimulatedSource, StallSwitch, Waveform};

use crate::error::Result;

/// Receiver of converted samples, one call per sample.
pub trait SampleSink: Send + 'static {
    /// Deliver one sample. Returns `false` if the sample could not be taken
    /// (a full FIFO); the source decides whether to retry or drop it.
    fn on_sample(&mut self, sample: i16) -> bool;
}

/// Periodic trigger for the Sample Source.
pub trait SampleClock: Send {
    /// Start triggering conversions. Arming an armed clock is a no-op.
    fn arm(&mut self) -> Result<()>;

    /// Stop triggering. Once this returns, the sink receives no further samples.
    fn disarm(&mut self);
}

/// Converts one physical sample per clock tick and signals completion.
pub trait SampleSource: Send {
    /// Poll calibration. `Ok(true)` once the converter is ready.
    fn calibrate(&mut self) -> Result<bool>;

    /// Route completed conversions to `sink`. Called once, before arming.
    fn connect(&mut self, sink: Box<dyn SampleSink>) -> Result<()>;
}

/// A clock and the source it triggers, driven together by a capture driver.
pub trait CaptureHardware: SampleClock + SampleSource {}

impl<T: SampleClock + SampleSource> CaptureHardware for T {}
