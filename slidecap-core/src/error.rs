use thiserror::Error;

/// All errors produced by slidecap-core.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("invalid capture configuration: {0}")]
    InvalidConfig(String),

    #[error("window of {requested} samples exceeds the output capacity of {capacity}")]
    WindowTooLarge { requested: usize, capacity: usize },

    #[error("sample source did not finish calibrating after {attempts} attempts")]
    CalibrationTimeout { attempts: u32 },

    #[error("no audio chunk arrived after {attempts} bootstrap attempts")]
    BootstrapTimeout { attempts: u32 },

    #[error("sample source has no sink connected")]
    SourceNotConnected,

    #[error("invalid test chunk: {0}")]
    InvalidTestChunk(String),

    #[error("invalid command frame: {0}")]
    InvalidFrame(String),

    #[error("audio device error: {0}")]
    AudioDevice(String),

    #[error("audio stream error: {0}")]
    AudioStream(String),

    #[error("no default input device found")]
    NoDefaultInputDevice,

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, CaptureError>;
