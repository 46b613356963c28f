//! `AudioProvider`: the consumer-facing capture controller.
//!
//! ## Lifecycle
//!
//! ```text
//! AudioProvider::new()
//!     └─► init_capture()     → hardware armed, blocks until first chunk, phase = Capturing
//!         └─► poll_timestamp() / get_window()   (repeat, at least once per ring length)
//!             └─► test-mode command seen → live driver torn down, test feed seeded
//! ```
//!
//! `init_capture()` is idempotent. Test mode is one-way: once entered, the
//! live driver is never re-armed for the lifetime of the provider.
//!
//! ## Threading
//!
//! The provider itself lives on the consumer thread. The live writer runs in
//! the source completion context (immediate) or a dedicated capture thread
//! (polling). The two sides share only the ring slots and the timeline.

pub mod diagnostics;
pub mod driver;
pub mod spin;
pub mod timeline;

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::{
    audio::CaptureHardware,
    buffering::{
        ring::{CaptureRing, RingWriter},
        window::WindowReader,
    },
    config::CaptureConfig,
    error::{CaptureError, Result},
    feed::{CommandSource, FeedCommand, TestFeed},
    ipc::events::{CaptureMode, CapturePhase, CaptureStatusEvent},
};

use self::diagnostics::{CaptureDiagnostics, DiagnosticsSnapshot};
use self::driver::{build_driver, CaptureDriver, DriverContext};
use self::spin::{BoundedSpin, SpinOutcome};
use self::timeline::Timeline;

/// Status broadcast capacity.
const STATUS_CAP: usize = 32;

/// Owns every piece of capture state: ring, timeline, mode, driver, feed.
pub struct AudioProvider {
    config: CaptureConfig,
    ring: Arc<CaptureRing>,
    timeline: Arc<Timeline>,
    diagnostics: Arc<CaptureDiagnostics>,
    /// `None` once torn down on the switch to test mode.
    driver: Option<Box<dyn CaptureDriver>>,
    initialized: bool,
    mode: CaptureMode,
    phase: CapturePhase,
    commands: Box<dyn CommandSource>,
    /// Present only in test mode.
    feed: Option<TestFeed>,
    window: WindowReader,
    status_tx: broadcast::Sender<CaptureStatusEvent>,
}

impl AudioProvider {
    /// Allocate the ring and output window and bind the hardware. Does not
    /// arm anything; call `init_capture()` for that.
    ///
    /// # Errors
    /// `CaptureError::InvalidConfig` if `config` fails validation.
    pub fn new(
        config: CaptureConfig,
        hardware: Box<dyn CaptureHardware>,
        commands: Box<dyn CommandSource>,
    ) -> Result<Self> {
        config.validate()?;

        let ring = Arc::new(CaptureRing::new(config.ring_capacity()));
        let timeline = Arc::new(Timeline::new());
        let diagnostics = Arc::new(CaptureDiagnostics::default());
        let window = WindowReader::new(
            Arc::clone(&ring),
            config.samples_per_ms(),
            config.max_window_samples(),
        );
        let driver = build_driver(
            &config,
            hardware,
            RingWriter::new(Arc::clone(&ring), 0),
            DriverContext::new(&config, Arc::clone(&timeline), Arc::clone(&diagnostics)),
        );
        let (status_tx, _) = broadcast::channel(STATUS_CAP);

        info!(
            sample_rate = config.sample_rate,
            chunk_samples = config.chunk_samples,
            ring_capacity = config.ring_capacity(),
            strategy = ?config.strategy,
            "audio provider created"
        );

        Ok(Self {
            config,
            ring,
            timeline,
            diagnostics,
            driver: Some(driver),
            initialized: false,
            mode: CaptureMode::Live,
            phase: CapturePhase::Idle,
            commands,
            feed: None,
            window,
            status_tx,
        })
    }

    /// Arm the capture pipeline and block until the first chunk exists.
    ///
    /// A no-op once initialised, and in test mode.
    ///
    /// # Errors
    /// - `CaptureError::CalibrationTimeout` if the source never calibrates.
    /// - `CaptureError::BootstrapTimeout` if no chunk arrives in time. The
    ///   hardware stays armed; a later call resumes waiting without re-arming.
    /// - Any backend error raised while arming.
    pub fn init_capture(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }
        if self.mode == CaptureMode::Test {
            debug!("init_capture ignored in test mode");
            return Ok(());
        }
        let Some(driver) = self.driver.as_mut() else {
            return Ok(());
        };

        self.phase = CapturePhase::Bootstrapping;
        if let Err(e) = driver.start() {
            error!(error = %e, "capture driver failed to start");
            self.set_phase(CapturePhase::Error, Some(e.to_string()));
            return Err(e);
        }

        let spin = BoundedSpin::new(self.config.bootstrap_attempts, self.config.wait_backoff());
        let timeline = Arc::clone(&self.timeline);
        match spin.wait(|| timeline.latest_ms() > 0) {
            SpinOutcome::Ready { attempts } => {
                self.initialized = true;
                self.set_phase(CapturePhase::Capturing, None);
                info!(
                    attempts,
                    latest_ms = self.timeline.latest_ms(),
                    "capture initialised, first chunk available"
                );
                Ok(())
            }
            SpinOutcome::Exhausted { attempts } => {
                warn!(attempts, "no audio chunk arrived during bootstrap");
                let err = CaptureError::BootstrapTimeout { attempts };
                self.set_phase(CapturePhase::Error, Some(err.to_string()));
                Err(err)
            }
        }
    }

    /// Copy `duration_ms` of audio starting `start_ms` after capture start.
    ///
    /// The slice is valid until the next call. Data older than one ring length
    /// has been overwritten and is returned without complaint.
    ///
    /// # Errors
    /// `CaptureError::WindowTooLarge` when `duration_ms` exceeds `max_window_ms`.
    pub fn get_window(&mut self, start_ms: u64, duration_ms: u64) -> Result<&[i16]> {
        self.window.read(start_ms, duration_ms)
    }

    /// Latest timestamp (ms), with mode-switch detection and test-feed
    /// processing as side effects.
    pub fn poll_timestamp(&mut self) -> u64 {
        if self.mode == CaptureMode::Live {
            while let Some(cmd) = self.commands.try_next() {
                match cmd {
                    FeedCommand::EnterTestMode => {
                        self.enter_test_mode();
                        break;
                    }
                    FeedCommand::Chunk(chunk) => {
                        warn!(
                            offset = chunk.offset(),
                            length = chunk.length(),
                            "test chunk received in live mode, dropped"
                        );
                    }
                }
            }
        }

        match self.mode {
            CaptureMode::Live => self.timeline.latest_ms(),
            CaptureMode::Test => self.process_test_input(),
        }
    }

    /// Latest timestamp without any side effects.
    pub fn latest_timestamp(&self) -> u64 {
        self.timeline.latest_ms()
    }

    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    pub fn phase(&self) -> CapturePhase {
        self.phase
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn diagnostics_snapshot(&self) -> DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    pub fn subscribe_status(&self) -> broadcast::Receiver<CaptureStatusEvent> {
        self.status_tx.subscribe()
    }

    // ── Internal helpers ─────────────────────────────────────────────────────

    fn enter_test_mode(&mut self) {
        if let Some(mut driver) = self.driver.take() {
            driver.teardown();
            self.set_phase(CapturePhase::Stopped, None);
        }
        self.initialized = false;

        let start = self.timeline.latest_ms() * self.config.samples_per_ms() as u64;
        self.feed = Some(TestFeed::new(
            Arc::clone(&self.ring),
            start,
            &self.config,
            Arc::clone(&self.diagnostics),
        ));
        self.mode = CaptureMode::Test;
        info!(
            start_index = start,
            latest_ms = self.timeline.latest_ms(),
            chunks_captured = self.diagnostics.snapshot().chunks_captured,
            "test mode entered, live capture stopped"
        );
        self.set_phase(CapturePhase::Capturing, Some("test mode".into()));
    }

    fn process_test_input(&mut self) -> u64 {
        let Some(feed) = self.feed.as_mut() else {
            return self.timeline.latest_ms();
        };

        while let Some(cmd) = self.commands.try_next() {
            match cmd {
                FeedCommand::Chunk(chunk) => feed.submit_chunk(&chunk),
                FeedCommand::EnterTestMode => debug!("already in test mode"),
            }
        }

        let quantized = feed.finish_cycle();
        self.timeline.publish(quantized)
    }

    fn set_phase(&mut self, phase: CapturePhase, detail: Option<String>) {
        self.phase = phase;
        let _ = self.status_tx.send(CaptureStatusEvent {
            mode: self.mode,
            phase,
            latest_ms: self.timeline.latest_ms(),
            detail,
        });
    }
}

impl Drop for AudioProvider {
    fn drop(&mut self) {
        if let Some(mut driver) = self.driver.take() {
            if driver.is_running() {
                debug!(strategy = ?driver.strategy(), "tearing down capture driver");
            }
            driver.teardown();
        }
    }
}

impl std::fmt::Debug for AudioProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioProvider")
            .field("mode", &self.mode)
            .field("phase", &self.phase)
            .field("initialized", &self.initialized)
            .field("latest_ms", &self.timeline.latest_ms())
            .finish_non_exhaustive()
    }
}
