//! Live microphone as Sample Clock + Sample Source, via cpal.
//!
//! # Threading note
//!
//! `cpal::Stream` is `!Send` on most platforms (COM on Windows, CoreAudio on
//! macOS), but capture drivers move their hardware across threads. The stream
//! is therefore created, played, paused and dropped on one dedicated owner
//! thread; `CpalSource` only holds a control channel to it. A sync reply
//! channel propagates open/play errors back to the caller.
//!
//! The device clock is the Sample Clock: `arm` plays the stream, `disarm`
//! pauses it. Interleaved frames are averaged to mono `i16` inside the
//! callback before reaching the sink, one sample per frame.

use std::thread::JoinHandle;

use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    SampleFormat, SampleRate, Stream, StreamConfig,
};
use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::{error, info, warn};

use super::{SampleClock, SampleSink, SampleSource};
use crate::error::{CaptureError, Result};

enum StreamControl {
    Play(Sender<Result<()>>),
    Pause(Sender<()>),
}

/// Names of all input devices on the default host.
pub fn list_input_devices() -> Vec<String> {
    let host = cpal::default_host();
    match host.input_devices() {
        Ok(devices) => devices.filter_map(|d| d.name().ok()).collect(),
        Err(e) => {
            warn!("failed to enumerate input devices: {e}");
            Vec::new()
        }
    }
}

/// cpal-backed capture hardware.
pub struct CpalSource {
    preferred_device: Option<String>,
    sample_rate: u32,
    control: Option<Sender<StreamControl>>,
    owner: Option<JoinHandle<()>>,
    armed: bool,
}

impl CpalSource {
    /// `preferred_device` falls back to the default input when absent or not found.
    pub fn new(sample_rate: u32, preferred_device: Option<String>) -> Self {
        Self {
            preferred_device,
            sample_rate,
            control: None,
            owner: None,
            armed: false,
        }
    }

    fn select_device(preferred: Option<&str>) -> Result<cpal::Device> {
        let host = cpal::default_host();
        if let Some(name) = preferred {
            let found = host
                .input_devices()
                .map_err(|e| CaptureError::AudioDevice(e.to_string()))?
                .find(|d| d.name().map(|n| n == name).unwrap_or(false));
            match found {
                Some(device) => return Ok(device),
                None => warn!("preferred input device '{}' not found, falling back", name),
            }
        }
        host.default_input_device()
            .ok_or(CaptureError::NoDefaultInputDevice)
    }

    /// Open `device` at `sample_rate`, preferring i16 over f32 samples.
    fn open_stream(
        device: &cpal::Device,
        sample_rate: u32,
        mut sink: Box<dyn SampleSink>,
    ) -> Result<Stream> {
        let ranges = device
            .supported_input_configs()
            .map_err(|e| CaptureError::AudioDevice(e.to_string()))?
            .filter(|r| {
                r.min_sample_rate().0 <= sample_rate && r.max_sample_rate().0 >= sample_rate
            })
            .collect::<Vec<_>>();
        let supported = ranges
            .iter()
            .find(|r| r.sample_format() == SampleFormat::I16)
            .or_else(|| ranges.iter().find(|r| r.sample_format() == SampleFormat::F32))
            .cloned()
            .ok_or_else(|| {
                CaptureError::AudioDevice(format!("device cannot capture i16/f32 at {sample_rate} Hz"))
            })?
            .with_sample_rate(SampleRate(sample_rate));

        let channels = supported.channels().max(1) as usize;
        let config = StreamConfig {
            channels: supported.channels(),
            sample_rate: SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };
        info!(
            device = device.name().unwrap_or_default().as_str(),
            sample_rate,
            channels,
            format = ?supported.sample_format(),
            "audio config selected"
        );

        let stream = match supported.sample_format() {
            SampleFormat::I16 => device.build_input_stream(
                &config,
                move |data: &[i16], _info| {
                    for frame in data.chunks(channels) {
                        let sum: i32 = frame.iter().map(|&s| s as i32).sum();
                        sink.on_sample((sum / frame.len() as i32) as i16);
                    }
                },
                |err| error!("audio stream error: {err}"),
                None,
            ),
            SampleFormat::F32 => device.build_input_stream(
                &config,
                move |data: &[f32], _info| {
                    for frame in data.chunks(channels) {
                        let mean = frame.iter().sum::<f32>() / frame.len() as f32;
                        sink.on_sample((mean.clamp(-1.0, 1.0) * i16::MAX as f32) as i16);
                    }
                },
                |err| error!("audio stream error: {err}"),
                None,
            ),
            fmt => {
                return Err(CaptureError::AudioStream(format!(
                    "unsupported sample format: {fmt:?}"
                )))
            }
        }
        .map_err(|e| CaptureError::AudioStream(e.to_string()))?;

        Ok(stream)
    }

    fn run_owner(stream: Stream, control: Receiver<StreamControl>) {
        // Exits when the control sender is dropped; the stream drops with it.
        for msg in control.iter() {
            match msg {
                StreamControl::Play(reply) => {
                    let result = stream
                        .play()
                        .map_err(|e| CaptureError::AudioStream(e.to_string()));
                    let _ = reply.send(result);
                }
                StreamControl::Pause(reply) => {
                    if let Err(e) = stream.pause() {
                        warn!("failed to pause input stream: {e}");
                    }
                    let _ = reply.send(());
                }
            }
        }
    }
}

impl SampleSource for CpalSource {
    fn calibrate(&mut self) -> Result<bool> {
        Ok(true)
    }

    fn connect(&mut self, sink: Box<dyn SampleSink>) -> Result<()> {
        let (control_tx, control_rx) = crossbeam_channel::unbounded::<StreamControl>();
        let (open_tx, open_rx) = bounded::<Result<()>>(1);
        let preferred = self.preferred_device.clone();
        let sample_rate = self.sample_rate;

        let owner = std::thread::Builder::new()
            .name("slidecap-cpal".into())
            .spawn(move || {
                let opened = Self::select_device(preferred.as_deref())
                    .and_then(|device| Self::open_stream(&device, sample_rate, sink));
                match opened {
                    Ok(stream) => {
                        let _ = open_tx.send(Ok(()));
                        Self::run_owner(stream, control_rx);
                    }
                    Err(e) => {
                        let _ = open_tx.send(Err(e));
                    }
                }
            })?;

        match open_rx.recv() {
            Ok(Ok(())) => {
                self.control = Some(control_tx);
                self.owner = Some(owner);
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = owner.join();
                Err(e)
            }
            Err(_) => Err(CaptureError::Other(anyhow::anyhow!(
                "cpal owner thread died before opening the stream"
            ))),
        }
    }
}

impl SampleClock for CpalSource {
    fn arm(&mut self) -> Result<()> {
        if self.armed {
            return Ok(());
        }
        let control = self.control.as_ref().ok_or(CaptureError::SourceNotConnected)?;
        let (reply_tx, reply_rx) = bounded(1);
        control
            .send(StreamControl::Play(reply_tx))
            .map_err(|_| CaptureError::AudioStream("cpal owner thread is gone".into()))?;
        reply_rx
            .recv()
            .map_err(|_| CaptureError::AudioStream("cpal owner thread is gone".into()))??;
        self.armed = true;
        Ok(())
    }

    fn disarm(&mut self) {
        if !self.armed {
            return;
        }
        self.armed = false;
        let Some(control) = self.control.as_ref() else {
            return;
        };
        let (reply_tx, reply_rx) = bounded(1);
        if control.send(StreamControl::Pause(reply_tx)).is_ok() {
            let _ = reply_rx.recv();
        }
    }
}

impl Drop for CpalSource {
    fn drop(&mut self) {
        self.disarm();
        self.control = None;
        if let Some(owner) = self.owner.take() {
            if owner.join().is_err() {
                error!("cpal owner thread panicked");
            }
        }
    }
}
