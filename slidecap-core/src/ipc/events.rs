//! Status events broadcast by `AudioProvider`.

use serde::{Deserialize, Serialize};

/// Which producer currently feeds the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMode {
    /// The Sample Source through a capture driver.
    Live,
    /// Framed chunks from the test command channel. Never left once entered.
    Test,
}

/// Lifecycle phase of the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapturePhase {
    /// Built, `init_capture()` not yet called.
    Idle,
    /// Hardware armed, waiting for the first chunk.
    Bootstrapping,
    /// Audio is flowing (live or injected).
    Capturing,
    /// The live driver was torn down.
    Stopped,
    /// Initialisation failed.
    Error,
}

/// Emitted whenever the provider changes phase or mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureStatusEvent {
    pub mode: CaptureMode,
    pub phase: CapturePhase,
    /// Latest timestamp at the time of the change (ms).
    pub latest_ms: u64,
    /// Optional human-readable detail (e.g. error message).
    pub detail: Option<String>,
}
