//! Capture drivers: the two ways the live path fills the ring.
//!
//! ## Immediate
//!
//! ```text
//! Sample Clock ─► Sample Source ─► ImmediateSink::on_sample
//!                                      ├─ ring.write(sample)
//!                                      └─ chunk boundary? → timeline.advance(chunk_ms)
//! ```
//!
//! ## Polling
//!
//! ```text
//! Sample Source ─► FifoSink ─► SPSC FIFO ─► capture thread
//!
//! WaitForStart → StartMeasurement → CollectSamples → StopMeasurement ─┐
//!      ▲            (arm clock)      (busy-poll FIFO)  (disarm clock,  │
//!      │                                                advance ts)    │
//!      └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! In both variants the writer context is the only writer of the ring and
//! of the timeline until `teardown()` returns.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, OnceLock,
};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use super::diagnostics::CaptureDiagnostics;
use super::spin::{BoundedSpin, SpinOutcome};
use super::timeline::Timeline;
use crate::audio::{CaptureHardware, SampleSink};
use crate::buffering::{
    create_sample_fifo, ring::RingWriter, Consumer, Producer, SampleConsumer, SampleProducer,
};
use crate::config::{CaptureConfig, CaptureStrategy};
use crate::error::{CaptureError, Result};

/// Idle polls between `yield_now` calls in `CollectSamples`.
const DEFAULT_POLL_YIELD_EVERY: u32 = 256;
/// Bound on waiting for an in-flight sink call after teardown (about 100 ms).
const QUIESCE_ATTEMPTS: u32 = 1_000;
const QUIESCE_BACKOFF: Duration = Duration::from_micros(100);

/// Common contract of the immediate and polling drivers.
pub trait CaptureDriver: Send {
    fn strategy(&self) -> CaptureStrategy;

    /// Calibrate, connect and arm the hardware. Returns without waiting for
    /// data. Calling it again after success is a no-op.
    fn start(&mut self) -> Result<()>;

    /// Disarm the hardware and stop the writer context. Once this returns,
    /// nothing on the live path writes to the ring or the timeline.
    fn teardown(&mut self);

    fn is_running(&self) -> bool;
}

/// State shared by both drivers and every sink they install.
#[derive(Clone)]
pub struct DriverContext {
    pub timeline: Arc<Timeline>,
    pub diagnostics: Arc<CaptureDiagnostics>,
    /// Cleared on teardown; sinks stop writing as soon as they observe it.
    pub running: Arc<AtomicBool>,
    /// Set while an immediate sink is inside `on_sample`.
    pub in_sink: Arc<AtomicBool>,
    pub chunk_samples: u64,
    pub chunk_ms: u64,
}

impl DriverContext {
    pub fn new(
        config: &CaptureConfig,
        timeline: Arc<Timeline>,
        diagnostics: Arc<CaptureDiagnostics>,
    ) -> Self {
        Self {
            timeline,
            diagnostics,
            running: Arc::new(AtomicBool::new(false)),
            in_sink: Arc::new(AtomicBool::new(false)),
            chunk_samples: config.chunk_samples as u64,
            chunk_ms: config.chunk_ms(),
        }
    }

    /// Wait for a sink call that passed the `running` check before teardown
    /// cleared it. Backends that deliver from their own thread may still be
    /// inside `on_sample` when `disarm` returns.
    fn quiesce(&self) {
        let spin = BoundedSpin::new(QUIESCE_ATTEMPTS, QUIESCE_BACKOFF);
        let in_sink = Arc::clone(&self.in_sink);
        if let SpinOutcome::Exhausted { attempts } = spin.wait(|| !in_sink.load(Ordering::Acquire))
        {
            warn!(attempts, "sample sink still busy after teardown");
        }
    }

    fn complete_chunk(&self) {
        let latest = self.timeline.advance(self.chunk_ms);
        let chunks = self
            .diagnostics
            .chunks_captured
            .fetch_add(1, Ordering::Relaxed)
            + 1;
        if chunks == 1 {
            debug!(latest_ms = latest, "first chunk captured");
        }
    }
}

/// Build the driver selected by `config.strategy`.
pub fn build_driver(
    config: &CaptureConfig,
    hardware: Box<dyn CaptureHardware>,
    writer: RingWriter,
    ctx: DriverContext,
) -> Box<dyn CaptureDriver> {
    let calibration = BoundedSpin::new(config.calibration_attempts, config.wait_backoff());
    match config.strategy {
        CaptureStrategy::Immediate => Box::new(ImmediateDriver {
            hardware,
            sink: Some(ImmediateSink {
                writer,
                ctx: ctx.clone(),
            }),
            ctx,
            calibration,
            armed: false,
        }),
        CaptureStrategy::Polling => Box::new(PollingDriver {
            hardware: Some(hardware),
            writer: Some(writer),
            ctx,
            calibration,
            fifo_capacity: config.fifo_capacity,
            consumer: None,
            worker: None,
        }),
    }
}

fn calibrate(hardware: &mut dyn CaptureHardware, spin: &BoundedSpin) -> Result<()> {
    match spin.try_wait(|| hardware.calibrate())? {
        SpinOutcome::Ready { attempts } => {
            debug!(attempts, "sample source calibrated");
            Ok(())
        }
        SpinOutcome::Exhausted { attempts } => {
            error!(attempts, "sample source never finished calibrating");
            Err(CaptureError::CalibrationTimeout { attempts })
        }
    }
}

// ── Immediate ────────────────────────────────────────────────────────────────

/// Copies each sample into the ring from the completion context.
struct ImmediateSink {
    writer: RingWriter,
    ctx: DriverContext,
}

impl SampleSink for ImmediateSink {
    fn on_sample(&mut self, sample: i16) -> bool {
        // Publish entry before checking `running`; teardown clears `running`
        // before waiting on `in_sink`, so one of the two sides sees the other.
        self.ctx.in_sink.store(true, Ordering::SeqCst);
        if !self.ctx.running.load(Ordering::SeqCst) {
            self.ctx.in_sink.store(false, Ordering::Release);
            return true;
        }
        self.write(sample);
        self.ctx.in_sink.store(false, Ordering::Release);
        true
    }
}

impl ImmediateSink {
    fn write(&mut self, sample: i16) {
        self.writer.write(sample);
        self.ctx
            .diagnostics
            .samples_captured
            .fetch_add(1, Ordering::Relaxed);
        if self.writer.cursor() % self.ctx.chunk_samples == 0 {
            self.ctx.complete_chunk();
        }
    }
}

struct ImmediateDriver {
    hardware: Box<dyn CaptureHardware>,
    /// Moved into the hardware on the first successful connect.
    sink: Option<ImmediateSink>,
    ctx: DriverContext,
    calibration: BoundedSpin,
    armed: bool,
}

impl CaptureDriver for ImmediateDriver {
    fn strategy(&self) -> CaptureStrategy {
        CaptureStrategy::Immediate
    }

    fn start(&mut self) -> Result<()> {
        if self.armed {
            return Ok(());
        }
        if self.sink.is_some() {
            calibrate(self.hardware.as_mut(), &self.calibration)?;
            if let Some(sink) = self.sink.take() {
                self.hardware.connect(Box::new(sink))?;
            }
        }
        self.ctx.running.store(true, Ordering::SeqCst);
        if let Err(e) = self.hardware.arm() {
            self.ctx.running.store(false, Ordering::SeqCst);
            return Err(e);
        }
        self.armed = true;
        info!(chunk_ms = self.ctx.chunk_ms, "immediate capture armed");
        Ok(())
    }

    fn teardown(&mut self) {
        if !self.armed {
            return;
        }
        self.ctx.running.store(false, Ordering::SeqCst);
        self.hardware.disarm();
        self.ctx.quiesce();
        self.armed = false;
        info!(
            chunks = self.ctx.diagnostics.chunks_captured.load(Ordering::Relaxed),
            "immediate capture torn down"
        );
    }

    fn is_running(&self) -> bool {
        self.armed
    }
}

impl Drop for ImmediateDriver {
    fn drop(&mut self) {
        self.teardown();
    }
}

// ── Polling ──────────────────────────────────────────────────────────────────

/// Pushes each sample into the ready FIFO. The FIFO being non-empty is the
/// "ready" flag the capture thread polls.
struct FifoSink {
    producer: SampleProducer,
    ctx: DriverContext,
}

impl SampleSink for FifoSink {
    fn on_sample(&mut self, sample: i16) -> bool {
        if !self.ctx.running.load(Ordering::Relaxed) {
            return true;
        }
        match self.producer.try_push(sample) {
            Ok(()) => true,
            Err(_) => {
                self.ctx
                    .diagnostics
                    .fifo_overruns
                    .fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }
}

/// States of the polling capture loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    WaitForStart,
    StartMeasurement,
    CollectSamples,
    StopMeasurement,
}

/// Everything the capture thread owns.
pub struct CaptureLoop {
    pub hardware: Box<dyn CaptureHardware>,
    pub consumer: SampleConsumer,
    pub writer: RingWriter,
    pub ctx: DriverContext,
}

impl CaptureLoop {
    /// One state transition. Returns `None` when the loop must stop.
    pub fn step(&mut self, state: CaptureState, idle_polls: &mut u32) -> Option<CaptureState> {
        let next = match state {
            CaptureState::WaitForStart => CaptureState::StartMeasurement,
            CaptureState::StartMeasurement => {
                if let Err(e) = self.hardware.arm() {
                    error!(error = %e, "failed to arm sample clock, capture loop exiting");
                    return None;
                }
                CaptureState::CollectSamples
            }
            CaptureState::CollectSamples => match self.consumer.try_pop() {
                Some(sample) => {
                    *idle_polls = 0;
                    self.writer.write(sample);
                    self.ctx
                        .diagnostics
                        .samples_captured
                        .fetch_add(1, Ordering::Relaxed);
                    if self.writer.cursor() % self.ctx.chunk_samples == 0 {
                        CaptureState::StopMeasurement
                    } else {
                        CaptureState::CollectSamples
                    }
                }
                None => {
                    *idle_polls += 1;
                    if *idle_polls % poll_yield_every() == 0 {
                        std::thread::yield_now();
                    } else {
                        std::hint::spin_loop();
                    }
                    CaptureState::CollectSamples
                }
            },
            CaptureState::StopMeasurement => {
                self.hardware.disarm();
                self.ctx.complete_chunk();
                CaptureState::WaitForStart
            }
        };
        Some(next)
    }

    /// Run until `ctx.running` is cleared, then disarm.
    pub fn run(mut self) {
        info!(chunk_samples = self.ctx.chunk_samples, "capture loop started");
        let mut state = CaptureState::WaitForStart;
        let mut idle_polls = 0u32;

        while self.ctx.running.load(Ordering::Relaxed) {
            match self.step(state, &mut idle_polls) {
                Some(next) => state = next,
                None => break,
            }
        }

        self.hardware.disarm();
        let snap = self.ctx.diagnostics.snapshot();
        info!(
            chunks = snap.chunks_captured,
            samples = snap.samples_captured,
            fifo_overruns = snap.fifo_overruns,
            "capture loop stopped"
        );
    }
}

fn poll_yield_every() -> u32 {
    static POLL_YIELD_EVERY: OnceLock<u32> = OnceLock::new();
    *POLL_YIELD_EVERY.get_or_init(|| {
        std::env::var("SLIDECAP_POLL_YIELD_EVERY")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .map(|v| v.clamp(1, 1 << 20))
            .unwrap_or(DEFAULT_POLL_YIELD_EVERY)
    })
}

struct PollingDriver {
    /// Moved into the capture thread on start.
    hardware: Option<Box<dyn CaptureHardware>>,
    writer: Option<RingWriter>,
    ctx: DriverContext,
    calibration: BoundedSpin,
    fifo_capacity: usize,
    /// Held between a successful connect and the thread spawn.
    consumer: Option<SampleConsumer>,
    worker: Option<JoinHandle<()>>,
}

impl CaptureDriver for PollingDriver {
    fn strategy(&self) -> CaptureStrategy {
        CaptureStrategy::Polling
    }

    fn start(&mut self) -> Result<()> {
        if self.worker.is_some() {
            return Ok(());
        }
        let Some(hardware) = self.hardware.as_mut() else {
            warn!("polling driver restarted after teardown, ignoring");
            return Ok(());
        };

        if self.consumer.is_none() {
            calibrate(hardware.as_mut(), &self.calibration)?;
            let (producer, consumer) = create_sample_fifo(self.fifo_capacity);
            hardware.connect(Box::new(FifoSink {
                producer,
                ctx: self.ctx.clone(),
            }))?;
            self.consumer = Some(consumer);
        }

        let (Some(hardware), Some(writer), Some(consumer)) =
            (self.hardware.take(), self.writer.take(), self.consumer.take())
        else {
            return Ok(());
        };

        self.ctx.running.store(true, Ordering::SeqCst);
        let capture = CaptureLoop {
            hardware,
            consumer,
            writer,
            ctx: self.ctx.clone(),
        };
        let handle = std::thread::Builder::new()
            .name("slidecap-capture".into())
            .spawn(move || capture.run())
            .map_err(|e| {
                self.ctx.running.store(false, Ordering::SeqCst);
                CaptureError::Io(e)
            })?;
        self.worker = Some(handle);
        info!(
            chunk_ms = self.ctx.chunk_ms,
            fifo_capacity = self.fifo_capacity,
            "polling capture started"
        );
        Ok(())
    }

    fn teardown(&mut self) {
        let Some(handle) = self.worker.take() else {
            return;
        };
        self.ctx.running.store(false, Ordering::SeqCst);
        if handle.join().is_err() {
            error!("capture thread panicked");
        }
    }

    fn is_running(&self) -> bool {
        self.worker.is_some()
    }
}

impl Drop for PollingDriver {
    fn drop(&mut self) {
        self.teardown();
    }
}
