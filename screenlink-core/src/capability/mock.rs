//! In-memory capability doubles.
//!
//! Every double is cheaply `Clone`; clones share their recordings, so a
//! test keeps one handle for assertions and moves another into the
//! runtime.
//!
//! ```ignore
//! let log = ActionLog::default();
//! let controls = Controls::new(
//!     Box::new(RecordingInjector::new(log.clone())),
//!     Box::new(RecordingClipboard::new(log.clone())),
//! );
//! // … drive the dispatcher …
//! assert_eq!(log.actions(), vec![Action::Click(2880, 540)]);
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use parking_lot::Mutex;

use super::{
    CaptureSession, ClipboardWriter, ImageCodec, InputInjector, Key, MatchCandidate, RawFrame,
    ScreenCapturer, TemplateMatcher,
};
use crate::error::{CaptureError, CodecError, InjectError, MatchError};
use crate::geometry::MonitorGeometry;

// ── Recorded actions ─────────────────────────────────────────────

/// One side effect observed by the recording doubles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Move(i32, i32),
    Click(i32, i32),
    Tap(Key),
    Chord(Vec<Key>),
    Clipboard(String),
}

/// Shared, ordered record of actions across injector and clipboard.
#[derive(Debug, Clone, Default)]
pub struct ActionLog {
    actions: Arc<Mutex<Vec<Action>>>,
}

impl ActionLog {
    pub fn push(&self, action: Action) {
        self.actions.lock().push(action);
    }

    pub fn actions(&self) -> Vec<Action> {
        self.actions.lock().clone()
    }

    pub fn clicks(&self) -> Vec<(i32, i32)> {
        self.actions
            .lock()
            .iter()
            .filter_map(|a| match a {
                Action::Click(x, y) => Some((*x, *y)),
                _ => None,
            })
            .collect()
    }
}

// ── RecordingInjector / RecordingClipboard ───────────────────────

#[derive(Debug, Clone)]
pub struct RecordingInjector {
    log: ActionLog,
    fail: Arc<AtomicBool>,
}

impl RecordingInjector {
    pub fn new(log: ActionLog) -> Self {
        Self {
            log,
            fail: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make every subsequent call fail without recording.
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    fn record(&self, action: Action) -> Result<(), InjectError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(InjectError::Input("mock failure".into()));
        }
        self.log.push(action);
        Ok(())
    }
}

impl InputInjector for RecordingInjector {
    fn move_to(&mut self, x: i32, y: i32) -> Result<(), InjectError> {
        self.record(Action::Move(x, y))
    }

    fn click(&mut self, x: i32, y: i32) -> Result<(), InjectError> {
        self.record(Action::Click(x, y))
    }

    fn key_tap(&mut self, key: Key) -> Result<(), InjectError> {
        self.record(Action::Tap(key))
    }

    fn key_chord(&mut self, keys: &[Key]) -> Result<(), InjectError> {
        self.record(Action::Chord(keys.to_vec()))
    }
}

#[derive(Debug, Clone)]
pub struct RecordingClipboard {
    log: ActionLog,
    fail: Arc<AtomicBool>,
}

impl RecordingClipboard {
    pub fn new(log: ActionLog) -> Self {
        Self {
            log,
            fail: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl ClipboardWriter for RecordingClipboard {
    fn set_text(&mut self, text: &str) -> Result<(), InjectError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(InjectError::Clipboard("mock failure".into()));
        }
        self.log.push(Action::Clipboard(text.to_string()));
        Ok(())
    }
}

// ── ScriptedCapturer ─────────────────────────────────────────────

#[derive(Debug)]
struct CaptureScript {
    monitors: Mutex<Vec<MonitorGeometry>>,
    screen: Mutex<Option<RgbImage>>,
    open_failures: AtomicUsize,
    grab_failures: AtomicUsize,
    opens: AtomicUsize,
    grabs: Mutex<Vec<MonitorGeometry>>,
}

/// A capture backend with a settable topology.
///
/// Grabs return a solid frame the size of the requested monitor, or a
/// copy of the image installed with [`set_screen`](Self::set_screen).
#[derive(Debug, Clone)]
pub struct ScriptedCapturer {
    script: Arc<CaptureScript>,
}

impl ScriptedCapturer {
    pub fn new(monitors: Vec<MonitorGeometry>) -> Self {
        Self {
            script: Arc::new(CaptureScript {
                monitors: Mutex::new(monitors),
                screen: Mutex::new(None),
                open_failures: AtomicUsize::new(0),
                grab_failures: AtomicUsize::new(0),
                opens: AtomicUsize::new(0),
                grabs: Mutex::new(Vec::new()),
            }),
        }
    }

    /// The common layout: combined desktop at 0 plus one entry per display.
    pub fn with_displays(displays: &[MonitorGeometry]) -> Self {
        let mut monitors = Vec::with_capacity(displays.len() + 1);
        monitors.extend(MonitorGeometry::bounding(displays));
        monitors.extend_from_slice(displays);
        Self::new(monitors)
    }

    pub fn set_monitors(&self, monitors: Vec<MonitorGeometry>) {
        *self.script.monitors.lock() = monitors;
    }

    pub fn set_screen(&self, screen: Option<RgbImage>) {
        *self.script.screen.lock() = screen;
    }

    /// Fail the next `n` calls to `open`.
    pub fn fail_next_opens(&self, n: usize) {
        self.script.open_failures.store(n, Ordering::SeqCst);
    }

    /// Fail the next `n` grabs.
    pub fn fail_next_grabs(&self, n: usize) {
        self.script.grab_failures.store(n, Ordering::SeqCst);
    }

    pub fn opens(&self) -> usize {
        self.script.opens.load(Ordering::SeqCst)
    }

    /// Monitors passed to successful grabs, in order.
    pub fn grabbed(&self) -> Vec<MonitorGeometry> {
        self.script.grabs.lock().clone()
    }
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

impl ScreenCapturer for ScriptedCapturer {
    fn open(&self) -> Result<Box<dyn CaptureSession>, CaptureError> {
        if take_one(&self.script.open_failures) {
            return Err(CaptureError::SessionOpen("scripted failure".into()));
        }
        self.script.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSession {
            script: Arc::clone(&self.script),
            monitors: self.script.monitors.lock().clone(),
        }))
    }
}

struct ScriptedSession {
    script: Arc<CaptureScript>,
    monitors: Vec<MonitorGeometry>,
}

impl CaptureSession for ScriptedSession {
    fn monitors(&self) -> Result<Vec<MonitorGeometry>, CaptureError> {
        Ok(self.monitors.clone())
    }

    fn grab(&mut self, monitor: &MonitorGeometry) -> Result<RawFrame, CaptureError> {
        if take_one(&self.script.grab_failures) {
            return Err(CaptureError::Grab("scripted failure".into()));
        }
        self.script.grabs.lock().push(*monitor);
        let image = match &*self.script.screen.lock() {
            Some(screen) => screen.clone(),
            None => RgbImage::from_pixel(monitor.width, monitor.height, Rgb([32, 64, 96])),
        };
        Ok(RawFrame::from_rgb(image))
    }
}

// ── SizeCodec ────────────────────────────────────────────────────

/// Cheap codec: nearest-neighbour resize, "encodes" as `"{w}x{h}"`.
///
/// Lets tests assert on emitted frame sizes without JPEG cost.
#[derive(Debug, Clone, Copy, Default)]
pub struct SizeCodec;

impl SizeCodec {
    /// Parse a payload produced by [`encode`](ImageCodec::encode).
    pub fn dimensions(payload: &[u8]) -> Option<(u32, u32)> {
        let text = std::str::from_utf8(payload).ok()?;
        let (w, h) = text.split_once('x')?;
        Some((w.parse().ok()?, h.parse().ok()?))
    }
}

impl ImageCodec for SizeCodec {
    fn downscale(&self, image: &RgbImage, width: u32, height: u32) -> RgbImage {
        imageops::resize(image, width, height, FilterType::Nearest)
    }

    fn encode(&self, image: &RgbImage, _quality: u8) -> Result<Vec<u8>, CodecError> {
        Ok(format!("{}x{}", image.width(), image.height()).into_bytes())
    }

    fn decode(&self, bytes: &[u8]) -> Result<RgbImage, CodecError> {
        super::JpegCodec.decode(bytes)
    }
}

// ── FixedMatcher ─────────────────────────────────────────────────

/// Returns a preset answer and counts calls.
#[derive(Debug, Clone, Default)]
pub struct FixedMatcher {
    answer: Arc<Mutex<Option<MatchCandidate>>>,
    fail: Arc<AtomicBool>,
    calls: Arc<AtomicUsize>,
}

impl FixedMatcher {
    pub fn new(answer: Option<MatchCandidate>) -> Self {
        let matcher = Self::default();
        matcher.set_answer(answer);
        matcher
    }

    pub fn set_answer(&self, answer: Option<MatchCandidate>) {
        *self.answer.lock() = answer;
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TemplateMatcher for FixedMatcher {
    fn best_match(
        &self,
        _haystack: &RgbImage,
        _needle: &RgbImage,
    ) -> Result<Option<MatchCandidate>, MatchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(MatchError::Backend("mock failure".into()));
        }
        Ok(*self.answer.lock())
    }
}
