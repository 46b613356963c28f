//! Persistent host settings (JSON file in the user data directory).

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use slidecap_core::{CaptureConfig, CaptureStrategy};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct AppSettings {
    pub capture: CaptureConfig,
    /// `simulated` or `cpal`.
    pub backend: String,
    pub preferred_input_device: Option<String>,
    /// Simulated backend only: `ramp`, `sine` or `silence`.
    pub waveform: String,
    /// Window the consumer loop reads on every poll.
    pub window_ms: u64,
    /// How often the consumer logs window statistics.
    pub report_interval_ms: u64,
    /// Samples per framed chunk when replaying a WAV through test mode.
    pub replay_chunk_samples: usize,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            capture: CaptureConfig::default(),
            backend: "simulated".into(),
            preferred_input_device: None,
            waveform: "sine".into(),
            window_ms: 256,
            report_interval_ms: 500,
            replay_chunk_samples: 512,
        }
    }
}

impl AppSettings {
    pub fn normalize(&mut self) {
        self.backend = normalize_backend(&self.backend);
        self.waveform = normalize_waveform(&self.waveform);
        self.window_ms = self.window_ms.clamp(1, self.capture.max_window_ms.max(1));
        self.report_interval_ms = self.report_interval_ms.clamp(10, 60_000);
        self.replay_chunk_samples = self.replay_chunk_samples.clamp(1, 1 << 16);
        self.preferred_input_device = self
            .preferred_input_device
            .as_ref()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
    }

    /// `SLIDECAP_BACKEND`, `SLIDECAP_STRATEGY` and `SLIDECAP_INPUT_DEVICE`
    /// take precedence over the file.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(backend) = std::env::var("SLIDECAP_BACKEND") {
            self.backend = normalize_backend(&backend);
        }
        if let Ok(strategy) = std::env::var("SLIDECAP_STRATEGY") {
            if let Some(strategy) = parse_strategy(&strategy) {
                self.capture.strategy = strategy;
            }
        }
        if let Ok(device) = std::env::var("SLIDECAP_INPUT_DEVICE") {
            let device = device.trim();
            if !device.is_empty() {
                self.preferred_input_device = Some(device.to_string());
            }
        }
    }
}

pub fn normalize_backend(raw: &str) -> String {
    match raw.trim().to_ascii_lowercase().as_str() {
        "cpal" | "mic" | "microphone" => "cpal".into(),
        _ => "simulated".into(),
    }
}

pub fn normalize_waveform(raw: &str) -> String {
    match raw.trim().to_ascii_lowercase().as_str() {
        "ramp" | "saw" => "ramp".into(),
        "silence" | "silent" | "zero" => "silence".into(),
        _ => "sine".into(),
    }
}

pub fn parse_strategy(raw: &str) -> Option<CaptureStrategy> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "immediate" | "interrupt" => Some(CaptureStrategy::Immediate),
        "polling" | "poll" => Some(CaptureStrategy::Polling),
        _ => None,
    }
}

pub fn default_settings_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("Lattice Labs")
            .join("slidecap")
            .join("settings.json")
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                std::env::var_os("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
                    .join(".local")
                    .join("share")
            })
            .join("slidecap")
            .join("settings.json")
    }
}

pub fn load_settings(path: &Path) -> AppSettings {
    let mut settings = fs::read_to_string(path)
        .ok()
        .and_then(|raw| serde_json::from_str::<AppSettings>(&raw).ok())
        .unwrap_or_default();
    settings.normalize();
    settings
}

pub fn save_settings(path: &Path, settings: &AppSettings) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings).map_err(std::io::Error::other)?;
    fs::write(path, json)
}
