//! slidecap host entry point.
//!
//! Builds an `AudioProvider` over the configured backend, optionally bridges
//! test commands from stdin or a WAV replay, then runs the window consumer
//! for a fixed duration.

mod bridge;
mod consumer;
mod settings;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use slidecap_core::{
    audio::wav::write_wav_mono, command_channel, AudioProvider, CaptureHardware, SimulatedSource,
    Waveform,
};
use tracing::{info, warn};

use settings::{default_settings_path, load_settings, save_settings, AppSettings};

#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    seconds: Option<u64>,
    replay: Option<PathBuf>,
    dump: Option<PathBuf>,
    stdin_commands: bool,
    write_default_config: bool,
    list_devices: bool,
}

fn parse_args() -> Result<Args> {
    let mut args = Args::default();
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--config" => {
                let Some(v) = it.next() else {
                    bail!("missing value for --config");
                };
                args.config = Some(PathBuf::from(v));
            }
            "--seconds" => {
                let Some(v) = it.next() else {
                    bail!("missing value for --seconds");
                };
                args.seconds = Some(v.parse().context("invalid --seconds")?);
            }
            "--replay" => {
                let Some(v) = it.next() else {
                    bail!("missing value for --replay");
                };
                args.replay = Some(PathBuf::from(v));
            }
            "--dump" => {
                let Some(v) = it.next() else {
                    bail!("missing value for --dump");
                };
                args.dump = Some(PathBuf::from(v));
            }
            "--stdin-commands" => args.stdin_commands = true,
            "--write-default-config" => args.write_default_config = true,
            "--list-devices" => args.list_devices = true,
            "-h" | "--help" => {
                println!(
                    "usage: slidecap [--config FILE] [--seconds N] [--replay WAV] [--dump WAV] \
                     [--stdin-commands] [--write-default-config] [--list-devices]"
                );
                std::process::exit(0);
            }
            other => bail!("unknown argument: {other}"),
        }
    }
    Ok(args)
}

fn build_hardware(settings: &AppSettings) -> Result<Box<dyn CaptureHardware>> {
    let rate = settings.capture.sample_rate;
    if settings.backend == "cpal" {
        return cpal_hardware(settings);
    }
    let waveform = match settings.waveform.as_str() {
        "ramp" => Waveform::Ramp,
        "silence" => Waveform::Silence,
        _ => Waveform::Sine {
            frequency_hz: 440.0,
            amplitude: i16::MAX / 4,
        },
    };
    Ok(Box::new(SimulatedSource::new(rate, waveform)))
}

#[cfg(feature = "audio-cpal")]
fn cpal_hardware(settings: &AppSettings) -> Result<Box<dyn CaptureHardware>> {
    Ok(Box::new(slidecap_core::CpalSource::new(
        settings.capture.sample_rate,
        settings.preferred_input_device.clone(),
    )))
}

#[cfg(not(feature = "audio-cpal"))]
fn cpal_hardware(_settings: &AppSettings) -> Result<Box<dyn CaptureHardware>> {
    bail!("backend 'cpal' requires building with the audio-cpal feature")
}

#[cfg(feature = "audio-cpal")]
fn list_devices() {
    for name in slidecap_core::audio::list_input_devices() {
        println!("{name}");
    }
}

#[cfg(not(feature = "audio-cpal"))]
fn list_devices() {
    println!("simulated");
}

fn main() -> Result<()> {
    // ── Tracing ───────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("slidecap=info")),
        )
        .init();

    let args = parse_args()?;
    if args.list_devices {
        list_devices();
        return Ok(());
    }

    let settings_path = args.config.clone().unwrap_or_else(default_settings_path);
    let mut settings = load_settings(&settings_path);
    if args.write_default_config {
        save_settings(&settings_path, &settings)
            .with_context(|| format!("failed to write {}", settings_path.display()))?;
        info!(path = %settings_path.display(), "settings written");
        return Ok(());
    }
    settings.apply_env_overrides();
    info!(
        backend = settings.backend.as_str(),
        strategy = ?settings.capture.strategy,
        window_ms = settings.window_ms,
        "slidecap starting"
    );

    let (tx, commands) = command_channel();
    let hardware = build_hardware(&settings)?;
    let mut provider = AudioProvider::new(settings.capture.clone(), hardware, Box::new(commands))?;
    let mut status = provider.subscribe_status();
    info!(
        ring_ms = provider.config().capacity_ms(),
        chunk_ms = provider.config().chunk_ms(),
        "capture ring allocated"
    );

    // The stdin reader blocks on input and is left to exit with the process.
    if args.stdin_commands {
        bridge::spawn_stdin_reader(tx.clone())?;
    }
    let replay = match args.replay.as_deref() {
        Some(path) => Some(bridge::spawn_replay(
            path,
            settings.capture.sample_rate,
            settings.replay_chunk_samples,
            tx.clone(),
        )?),
        None => None,
    };
    drop(tx);

    provider.init_capture()?;

    let seconds = args.seconds.unwrap_or(5);
    let deadline = Instant::now() + Duration::from_secs(seconds);
    let last_window = consumer::run_consumer(
        &mut provider,
        settings.window_ms,
        Duration::from_millis(settings.report_interval_ms),
        deadline,
    )?;

    while let Ok(event) = status.try_recv() {
        match serde_json::to_string(&event) {
            Ok(json) => info!(event = json.as_str(), "capture status"),
            Err(e) => warn!("failed to encode status event: {e}"),
        }
    }

    if let Some(path) = args.dump.as_deref() {
        write_wav_mono(path, &last_window, provider.config().sample_rate)?;
        info!(path = %path.display(), samples = last_window.len(), "window dumped");
    }

    let snap = provider.diagnostics_snapshot();
    info!(
        latest_ms = provider.latest_timestamp(),
        mode = ?provider.mode(),
        chunks = snap.chunks_captured,
        samples = snap.samples_captured,
        fifo_overruns = snap.fifo_overruns,
        test_chunks = snap.test_chunks,
        silence_blocks = snap.silence_blocks,
        "slidecap stopped"
    );
    drop(provider);

    if let Some(handle) = replay {
        if handle.join().is_err() {
            warn!("replay thread panicked");
        }
    }
    Ok(())
}
