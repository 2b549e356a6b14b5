//! Capability interfaces the runtime is built against.
//!
//! The agent never talks to the OS directly: screen capture, input
//! injection, the clipboard, template matching and image coding are all
//! injected at construction. Real backends live in [`crate::platform`]
//! (capture / input / clipboard) and in [`codec`] / [`matcher`]
//! (pure-Rust defaults). With the `test-util` feature, `mock` provides
//! recording doubles.
//!
//! # Monitor list convention
//!
//! [`CaptureSession::monitors`] returns index 0 as the bounding box of the
//! whole virtual desktop and indices `1..N` as the individual displays.

pub mod codec;
pub mod frame;
pub mod keys;
pub mod matcher;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

use image::RgbImage;

use crate::error::{CaptureError, CodecError, InjectError, MatchError};
use crate::geometry::MonitorGeometry;

pub use codec::JpegCodec;
pub use frame::{PixelFormat, RawFrame};
pub use keys::{Key, Keystroke};
pub use matcher::{MatchCandidate, SampledMatcher};

// ── Screen capture ───────────────────────────────────────────────

/// Opens capture sessions.
pub trait ScreenCapturer: Send + Sync {
    /// Bind to the current display topology.
    ///
    /// Backends typically fix monitor geometry and DPI at open time, so
    /// the producer reopens a session after every monitor switch.
    fn open(&self) -> Result<Box<dyn CaptureSession>, CaptureError>;
}

/// One open binding to the capture backend.
pub trait CaptureSession: Send {
    /// Monitors visible to this session (see the module docs for indexing).
    fn monitors(&self) -> Result<Vec<MonitorGeometry>, CaptureError>;

    /// Grab the current contents of `monitor`.
    fn grab(&mut self, monitor: &MonitorGeometry) -> Result<RawFrame, CaptureError>;
}

// ── Input / clipboard ────────────────────────────────────────────

/// Synthesises mouse and keyboard input. Coordinates are real space.
///
/// Implementations need not be reentrant; callers go through
/// [`crate::controls::Controls`], which serialises every call.
pub trait InputInjector: Send {
    fn move_to(&mut self, x: i32, y: i32) -> Result<(), InjectError>;

    /// Move to `(x, y)` and left-click.
    fn click(&mut self, x: i32, y: i32) -> Result<(), InjectError>;

    fn key_tap(&mut self, key: Key) -> Result<(), InjectError>;

    /// Press `keys` in order, release them in reverse order.
    fn key_chord(&mut self, keys: &[Key]) -> Result<(), InjectError>;

    fn press(&mut self, keystroke: &Keystroke) -> Result<(), InjectError> {
        match keystroke.keys() {
            [key] => self.key_tap(*key),
            keys => self.key_chord(keys),
        }
    }
}

/// Places text on the system clipboard.
pub trait ClipboardWriter: Send {
    fn set_text(&mut self, text: &str) -> Result<(), InjectError>;
}

// ── Template matching / image coding ─────────────────────────────

/// Numeric backend that locates `needle` inside `haystack`.
pub trait TemplateMatcher: Send + Sync {
    /// Best-scoring window, or `None` when the needle cannot fit.
    ///
    /// Scores are similarities in `0.0..=1.0`; thresholding is the
    /// caller's job.
    fn best_match(
        &self,
        haystack: &RgbImage,
        needle: &RgbImage,
    ) -> Result<Option<MatchCandidate>, MatchError>;
}

/// Image resize / lossy encode / template decode.
pub trait ImageCodec: Send + Sync {
    /// High-quality resample to exactly `width`×`height`.
    fn downscale(&self, image: &RgbImage, width: u32, height: u32) -> RgbImage;

    /// Lossy-encode at `quality` (1..=100).
    fn encode(&self, image: &RgbImage, quality: u8) -> Result<Vec<u8>, CodecError>;

    /// Decode a stored template image.
    fn decode(&self, bytes: &[u8]) -> Result<RgbImage, CodecError>;
}
