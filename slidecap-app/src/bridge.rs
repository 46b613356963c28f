//! Producers for the test command channel: JSON lines on stdin and WAV replay.

use std::io::BufRead;
use std::path::Path;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::Sender;
use slidecap_core::{audio::wav::load_wav_mono, feed::frame_stream, ipc::frames::decode_frame, FeedCommand};
use tracing::{debug, info, warn};

/// Forward every decodable line on stdin as a command. Blank lines are
/// skipped; malformed ones are logged and dropped.
pub fn spawn_stdin_reader(tx: Sender<FeedCommand>) -> Result<JoinHandle<()>> {
    let handle = std::thread::Builder::new()
        .name("slidecap-stdin".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        warn!("stdin read failed: {e}");
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                match decode_frame(&line) {
                    Ok(cmd) => {
                        if tx.send(cmd).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "dropping malformed command frame"),
                }
            }
            debug!("stdin closed");
        })?;
    Ok(handle)
}

/// Switch the provider to test mode and feed `path` through it as one
/// stream, paced at roughly real time.
pub fn spawn_replay(
    path: &Path,
    sample_rate: u32,
    chunk_samples: usize,
    tx: Sender<FeedCommand>,
) -> Result<JoinHandle<()>> {
    let samples = load_wav_mono(path, sample_rate)
        .with_context(|| format!("failed to load replay file {}", path.display()))?;
    let chunks = frame_stream(&samples, chunk_samples);
    let pace = Duration::from_micros(chunk_samples as u64 * 1_000_000 / sample_rate.max(1) as u64);
    info!(
        path = %path.display(),
        samples = samples.len(),
        chunks = chunks.len(),
        "replaying through test mode"
    );

    let handle = std::thread::Builder::new()
        .name("slidecap-replay".into())
        .spawn(move || {
            if tx.send(FeedCommand::EnterTestMode).is_err() {
                return;
            }
            for chunk in chunks {
                if tx.send(FeedCommand::Chunk(chunk)).is_err() {
                    return;
                }
                std::thread::sleep(pace);
            }
            debug!("replay finished");
        })?;
    Ok(handle)
}
