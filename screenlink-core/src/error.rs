//! Domain-specific error types for the screenlink agent.
//!
//! Every concern gets its own error kind so that each task can apply a
//! deliberate policy (skip, back off, drop, or terminate) instead of a
//! blanket catch. None of these are fatal to the process except an I/O
//! failure on the inbound command stream.

use thiserror::Error;

// ── CaptureError ─────────────────────────────────────────────────

/// Failures of the screen-capture capability.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The capture backend could not open a session.
    #[error("failed to open capture session: {0}")]
    SessionOpen(String),

    /// The backend reported no monitors at all.
    #[error("no monitors reported by the capture backend")]
    NoMonitors,

    /// A single frame grab failed (lock screen, permission dialog, …).
    #[error("frame grab failed: {0}")]
    Grab(String),

    /// The grabbed buffer does not match its declared geometry.
    #[error("malformed frame: {0}")]
    MalformedFrame(&'static str),

    /// Encoding the grabbed frame failed.
    #[error("frame encoding failed: {0}")]
    Codec(#[from] CodecError),

    /// Capture is not available on this platform.
    #[error("screen capture is not supported on this platform")]
    Unsupported,
}

// ── InjectError ──────────────────────────────────────────────────

/// Failures of the input-injection or clipboard capability.
#[derive(Debug, Error)]
pub enum InjectError {
    /// The OS rejected the synthetic input.
    #[error("input injection failed: {0}")]
    Input(String),

    /// The clipboard could not be opened or written.
    #[error("clipboard write failed: {0}")]
    Clipboard(String),

    /// A key name did not map to any known key.
    #[error("unknown key: {0:?}")]
    UnknownKey(String),

    /// Injection is not available on this platform.
    #[error("input injection is not supported on this platform")]
    Unsupported,
}

// ── CodecError ───────────────────────────────────────────────────

/// Failures of the image codec capability.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("image encode failed: {0}")]
    Encode(String),

    #[error("image decode failed: {0}")]
    Decode(String),
}

// ── MatchError ───────────────────────────────────────────────────

/// Failures while scanning the screen for a template.
#[derive(Debug, Error)]
pub enum MatchError {
    /// No capture session is active yet, so there is no monitor to scan.
    #[error("no active monitor")]
    NoActiveMonitor,

    /// Capturing the monitor for the scan failed.
    #[error("scan capture failed: {0}")]
    Capture(#[from] CaptureError),

    /// The template image could not be read.
    #[error("template {name} unavailable: {reason}")]
    TemplateUnavailable { name: String, reason: String },

    /// The numeric backend failed.
    #[error("matcher backend failed: {0}")]
    Backend(String),
}

// ── ProtocolError ────────────────────────────────────────────────

/// Why an inbound line was not turned into a command.
///
/// These are never surfaced to the controller: the protocol has no
/// negative acknowledgement, so the line is dropped and reading continues.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("line is not valid utf-8")]
    InvalidUtf8,

    #[error("line is not valid json: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("message has no string `type` field")]
    MissingType,

    #[error("unrecognised message type {0:?}")]
    UnknownType(String),

    #[error("invalid fields for {kind}: {source}")]
    InvalidFields {
        kind: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("line exceeds {max} bytes")]
    LineTooLong { max: usize },
}

// ── AgentError ───────────────────────────────────────────────────

/// The top-level error for the agent runtime.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The duplex byte stream reported an error.
    #[error("stream error: {0}")]
    Io(#[from] std::io::Error),

    /// The outbound channel was closed (writer task gone).
    #[error("channel closed")]
    ChannelClosed,

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Inject(#[from] InjectError),

    #[error(transparent)]
    Match(#[from] MatchError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for AgentError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        AgentError::ChannelClosed
    }
}
