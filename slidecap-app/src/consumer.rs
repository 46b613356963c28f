//! The single consumer: polls the timestamp, pulls the trailing window and
//! summarises it.

use std::time::{Duration, Instant};

use anyhow::Result;
use slidecap_core::AudioProvider;
use tracing::{debug, info};

/// Level summary of one window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowStats {
    pub rms: f32,
    pub peak: i16,
    /// Fraction of samples at full scale.
    pub clipped: f32,
}

impl WindowStats {
    pub fn measure(samples: &[i16]) -> Self {
        if samples.is_empty() {
            return Self {
                rms: 0.0,
                peak: 0,
                clipped: 0.0,
            };
        }
        let mut energy = 0.0f64;
        let mut peak = 0i16;
        let mut clipped = 0usize;
        for &s in samples {
            let v = s as f64 / i16::MAX as f64;
            energy += v * v;
            let magnitude = s.saturating_abs();
            peak = peak.max(magnitude);
            if magnitude == i16::MAX {
                clipped += 1;
            }
        }
        Self {
            rms: (energy / samples.len() as f64).sqrt() as f32,
            peak,
            clipped: clipped as f32 / samples.len() as f32,
        }
    }
}

/// Trailing window start for a `window_ms` read ending at `latest_ms`.
pub fn trailing_start(latest_ms: u64, window_ms: u64) -> u64 {
    latest_ms.saturating_sub(window_ms)
}

/// Poll the provider until `deadline`, reading the trailing `window_ms`
/// every time the timestamp moves. Returns the last window read.
pub fn run_consumer(
    provider: &mut AudioProvider,
    window_ms: u64,
    report_every: Duration,
    deadline: Instant,
) -> Result<Vec<i16>> {
    let mut last_ts = None;
    let mut last_report = Instant::now();
    let mut last_window = Vec::new();
    let mut windows = 0u64;

    while Instant::now() < deadline {
        let latest = provider.poll_timestamp();
        if last_ts == Some(latest) {
            std::thread::sleep(Duration::from_millis(1));
            continue;
        }
        last_ts = Some(latest);

        let mode = provider.mode();
        let start = trailing_start(latest, window_ms);
        let window = provider.get_window(start, window_ms)?;
        windows += 1;
        debug!(start_ms = start, latest_ms = latest, "window read");

        if last_report.elapsed() >= report_every {
            let stats = WindowStats::measure(window);
            info!(
                latest_ms = latest,
                mode = ?mode,
                rms = stats.rms,
                peak = stats.peak,
                clipped = stats.clipped,
                windows,
                "window"
            );
            last_report = Instant::now();
        }
        last_window.clear();
        last_window.extend_from_slice(window);
    }

    Ok(last_window)
}
