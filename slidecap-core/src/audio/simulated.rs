//! Software Sample Clock + Sample Source.
//!
//! Drives the capture path without hardware. While armed, a clock thread
//! generates samples from a [`Waveform`] and hands them to the connected sink,
//! either paced at the configured sample rate or as fast as the sink accepts
//! them.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    Arc,
};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, error};

use super::{SampleClock, SampleSink, SampleSource};
use crate::error::{CaptureError, Result};

/// Samples emitted per lock acquisition in lossless mode.
const LOSSLESS_BATCH: usize = 64;

/// Clock tick for real-time pacing.
const REALTIME_TICK: Duration = Duration::from_millis(1);

/// What the simulated converter produces.
#[derive(Debug, Clone)]
pub enum Waveform {
    Silence,
    /// Sample `n` has value `n as i16`. Handy for checking ordering.
    Ramp,
    Sine { frequency_hz: f32, amplitude: i16 },
    /// Played once; the source goes quiet afterwards.
    Sequence(Arc<[i16]>),
}

/// How the clock thread paces conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    /// `sample_rate / 1000` samples every millisecond. Refused samples are lost.
    RealTime,
    /// As fast as the sink accepts. A refused sample is retried.
    Lossless,
}

/// Counters for observing what a driver did to the hardware.
#[derive(Debug, Default)]
pub struct SimulatedProbe {
    calibrations: AtomicUsize,
    connects: AtomicUsize,
    arms: AtomicUsize,
    disarms: AtomicUsize,
    produced: AtomicU64,
}

impl SimulatedProbe {
    pub fn calibrations(&self) -> usize {
        self.calibrations.load(Ordering::SeqCst)
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn arms(&self) -> usize {
        self.arms.load(Ordering::SeqCst)
    }

    pub fn disarms(&self) -> usize {
        self.disarms.load(Ordering::SeqCst)
    }

    /// Samples the sink accepted.
    pub fn produced(&self) -> u64 {
        self.produced.load(Ordering::SeqCst)
    }
}

/// Holds an armed simulated clock silent until released.
#[derive(Debug, Clone, Default)]
pub struct StallSwitch(Arc<AtomicBool>);

impl StallSwitch {
    /// Let the converter start producing.
    pub fn release(&self) {
        self.0.store(false, Ordering::Release);
    }

    fn is_stalled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

struct Converter {
    sink: Option<Box<dyn SampleSink>>,
    waveform: Waveform,
    sample_rate: u32,
    /// Samples generated so far, accepted or not.
    generated: u64,
    /// A refused sample waiting to be retried (lossless pacing only).
    pending: Option<i16>,
}

struct Emitted {
    accepted: usize,
    exhausted: bool,
}

impl Converter {
    fn next_sample(&mut self) -> Option<i16> {
        let n = self.generated;
        let sample = match &self.waveform {
            Waveform::Silence => 0,
            Waveform::Ramp => n as i16,
            Waveform::Sine {
                frequency_hz,
                amplitude,
            } => {
                let phase =
                    2.0 * std::f64::consts::PI * *frequency_hz as f64 * n as f64
                        / self.sample_rate as f64;
                (phase.sin() * *amplitude as f64) as i16
            }
            Waveform::Sequence(samples) => *samples.get(n as usize)?,
        };
        self.generated += 1;
        Some(sample)
    }

    fn emit(&mut self, budget: usize, lossless: bool, probe: &SimulatedProbe) -> Emitted {
        let mut accepted = 0;
        while accepted < budget {
            let Some(sample) = self.pending.take().or_else(|| self.next_sample()) else {
                return Emitted {
                    accepted,
                    exhausted: true,
                };
            };
            let Some(sink) = self.sink.as_mut() else {
                self.pending = Some(sample);
                break;
            };
            if sink.on_sample(sample) {
                accepted += 1;
                probe.produced.fetch_add(1, Ordering::Relaxed);
            } else if lossless {
                self.pending = Some(sample);
                break;
            }
        }
        Emitted {
            accepted,
            exhausted: false,
        }
    }
}

/// Simulated converter plus timer.
pub struct SimulatedSource {
    converter: Arc<Mutex<Converter>>,
    pacing: Pacing,
    sample_rate: u32,
    /// `calibrate()` calls that report "busy" before the first "ready".
    calibration_delay: u32,
    calibration_polls: u32,
    armed: Arc<AtomicBool>,
    stall: StallSwitch,
    clock: Option<JoinHandle<()>>,
    probe: Arc<SimulatedProbe>,
}

impl SimulatedSource {
    pub fn new(sample_rate: u32, waveform: Waveform) -> Self {
        Self {
            converter: Arc::new(Mutex::new(Converter {
                sink: None,
                waveform,
                sample_rate: sample_rate.max(1),
                generated: 0,
                pending: None,
            })),
            pacing: Pacing::RealTime,
            sample_rate: sample_rate.max(1),
            calibration_delay: 0,
            calibration_polls: 0,
            armed: Arc::new(AtomicBool::new(false)),
            stall: StallSwitch::default(),
            clock: None,
            probe: Arc::new(SimulatedProbe::default()),
        }
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Report "busy" for the first `polls` calibration checks.
    /// `u32::MAX` models a converter that never finishes calibrating.
    pub fn with_calibration_delay(mut self, polls: u32) -> Self {
        self.calibration_delay = polls;
        self
    }

    /// Arm normally but produce nothing until the returned switch is released.
    /// Models a converter whose first conversion never completes.
    pub fn with_stalled_start(self) -> (Self, StallSwitch) {
        self.stall.0.store(true, Ordering::Release);
        let switch = self.stall.clone();
        (self, switch)
    }

    pub fn probe(&self) -> Arc<SimulatedProbe> {
        Arc::clone(&self.probe)
    }

    fn run_clock(
        converter: Arc<Mutex<Converter>>,
        armed: Arc<AtomicBool>,
        stall: StallSwitch,
        probe: Arc<SimulatedProbe>,
        pacing: Pacing,
        sample_rate: u32,
    ) {
        let per_tick = (sample_rate / 1000).max(1) as usize;
        let mut next_tick = Instant::now();

        while armed.load(Ordering::Acquire) {
            if stall.is_stalled() {
                std::thread::sleep(REALTIME_TICK);
                next_tick = Instant::now();
                continue;
            }
            match pacing {
                Pacing::RealTime => {
                    converter.lock().emit(per_tick, false, &probe);
                    next_tick += REALTIME_TICK;
                    let now = Instant::now();
                    if next_tick > now {
                        std::thread::sleep(next_tick - now);
                    }
                }
                Pacing::Lossless => {
                    let emitted = converter.lock().emit(LOSSLESS_BATCH, true, &probe);
                    if emitted.exhausted {
                        std::thread::sleep(REALTIME_TICK);
                    } else if emitted.accepted < LOSSLESS_BATCH {
                        std::thread::yield_now();
                    }
                }
            }
        }
    }
}

impl SampleSource for SimulatedSource {
    fn calibrate(&mut self) -> Result<bool> {
        self.probe.calibrations.fetch_add(1, Ordering::SeqCst);
        if self.calibration_polls >= self.calibration_delay {
            return Ok(true);
        }
        self.calibration_polls += 1;
        Ok(false)
    }

    fn connect(&mut self, sink: Box<dyn SampleSink>) -> Result<()> {
        self.converter.lock().sink = Some(sink);
        self.probe.connects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl SampleClock for SimulatedSource {
    fn arm(&mut self) -> Result<()> {
        if self.clock.is_some() {
            return Ok(());
        }
        if self.converter.lock().sink.is_none() {
            return Err(CaptureError::SourceNotConnected);
        }

        self.armed.store(true, Ordering::Release);
        let converter = Arc::clone(&self.converter);
        let armed = Arc::clone(&self.armed);
        let stall = self.stall.clone();
        let probe = Arc::clone(&self.probe);
        let pacing = self.pacing;
        let sample_rate = self.sample_rate;
        let handle = std::thread::Builder::new()
            .name("slidecap-sim-clock".into())
            .spawn(move || Self::run_clock(converter, armed, stall, probe, pacing, sample_rate))
            .map_err(|e| {
                self.armed.store(false, Ordering::Release);
                CaptureError::Io(e)
            })?;

        self.clock = Some(handle);
        self.probe.arms.fetch_add(1, Ordering::SeqCst);
        debug!(sample_rate, pacing = ?self.pacing, "simulated clock armed");
        Ok(())
    }

    fn disarm(&mut self) {
        let Some(handle) = self.clock.take() else {
            return;
        };
        self.armed.store(false, Ordering::Release);
        if handle.join().is_err() {
            error!("simulated clock thread panicked");
        }
        self.probe.disarms.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for SimulatedSource {
    fn drop(&mut self) {
        self.disarm();
    }
}
