//! Named template images and the scanner that finds them on screen.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use image::RgbImage;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::capability::{ImageCodec, ScreenCapturer, TemplateMatcher};
use crate::error::MatchError;
use crate::state::MonitorState;

pub const DEFAULT_ACCEPT_TEMPLATE: &str = "accept_exact_bgr.png";
pub const DEFAULT_RETRY_TEMPLATE: &str = "retry_button.png";

// ── TemplateId ───────────────────────────────────────────────────

/// The UI elements the agent knows how to look for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateId {
    /// The "accept" button clicked by the auto-accept loop.
    Accept,
    /// The "retry" button probed for after a loop submission.
    Retry,
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateId::Accept => f.write_str("accept"),
            TemplateId::Retry => f.write_str("retry"),
        }
    }
}

// ── TemplateLibrary ──────────────────────────────────────────────

/// Lazily decoded template images from one asset directory.
///
/// Each template is read at most once. A template that fails to load is
/// warned about once and then treated as permanently absent.
pub struct TemplateLibrary {
    dir: PathBuf,
    files: HashMap<TemplateId, String>,
    codec: Arc<dyn ImageCodec>,
    cache: Mutex<HashMap<TemplateId, Option<Arc<RgbImage>>>>,
}

impl TemplateLibrary {
    pub fn new(dir: impl Into<PathBuf>, codec: Arc<dyn ImageCodec>) -> Self {
        let files = HashMap::from([
            (TemplateId::Accept, DEFAULT_ACCEPT_TEMPLATE.to_string()),
            (TemplateId::Retry, DEFAULT_RETRY_TEMPLATE.to_string()),
        ]);
        Self {
            dir: dir.into(),
            files,
            codec,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Override the file name used for `id`.
    pub fn with_file(mut self, id: TemplateId, file: impl Into<String>) -> Self {
        self.files.insert(id, file.into());
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, id: TemplateId) -> PathBuf {
        match self.files.get(&id) {
            Some(file) => self.dir.join(file),
            None => self.dir.join(format!("{id}.png")),
        }
    }

    /// The decoded template, reading it on first use.
    pub fn load(&self, id: TemplateId) -> Result<Arc<RgbImage>, MatchError> {
        if let Some(cached) = self.cache.lock().get(&id) {
            return cached.clone().ok_or_else(|| MatchError::TemplateUnavailable {
                name: id.to_string(),
                reason: "failed to load earlier".into(),
            });
        }

        let path = self.path(id);
        let loaded = std::fs::read(&path)
            .map_err(|e| e.to_string())
            .and_then(|bytes| self.codec.decode(&bytes).map_err(|e| e.to_string()));

        let mut cache = self.cache.lock();
        match loaded {
            Ok(image) => {
                debug!(template = %id, path = %path.display(), "template loaded");
                let image = Arc::new(image);
                cache.insert(id, Some(Arc::clone(&image)));
                Ok(image)
            }
            Err(reason) => {
                warn!(
                    template = %id,
                    path = %path.display(),
                    "template unavailable, matching disabled for it: {reason}"
                );
                cache.insert(id, None);
                Err(MatchError::TemplateUnavailable {
                    name: id.to_string(),
                    reason,
                })
            }
        }
    }
}

impl fmt::Debug for TemplateLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateLibrary")
            .field("dir", &self.dir)
            .field("files", &self.files)
            .finish_non_exhaustive()
    }
}

// ── TemplateScanner ──────────────────────────────────────────────

/// A template found on screen. Coordinates are real space and point at
/// the template's center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemplateMatch {
    pub x: i32,
    pub y: i32,
    pub score: f32,
}

/// Captures the active monitor and searches it for a template.
///
/// The matcher is optional: without one every scan reports no match and
/// a single warning is logged.
pub struct TemplateScanner {
    capturer: Arc<dyn ScreenCapturer>,
    matcher: Option<Arc<dyn TemplateMatcher>>,
    library: TemplateLibrary,
    monitors: Arc<MonitorState>,
    missing_matcher_warned: AtomicBool,
}

impl TemplateScanner {
    pub fn new(
        capturer: Arc<dyn ScreenCapturer>,
        matcher: Option<Arc<dyn TemplateMatcher>>,
        library: TemplateLibrary,
        monitors: Arc<MonitorState>,
    ) -> Self {
        Self {
            capturer,
            matcher,
            library,
            monitors,
            missing_matcher_warned: AtomicBool::new(false),
        }
    }

    /// Search the active monitor for `id`.
    ///
    /// Returns `Ok(None)` when the best window scores below `threshold` or
    /// when no matcher is installed.
    pub fn locate(&self, id: TemplateId, threshold: f32) -> Result<Option<TemplateMatch>, MatchError> {
        let Some(matcher) = &self.matcher else {
            if !self.missing_matcher_warned.swap(true, Ordering::SeqCst) {
                warn!("no template matcher installed; template scans will never match");
            }
            return Ok(None);
        };

        let template = self.library.load(id)?;
        let active = self.monitors.active().ok_or(MatchError::NoActiveMonitor)?;

        let mut session = self.capturer.open()?;
        let screen = session.grab(&active.geometry)?.to_rgb_image()?;
        let Some(best) = matcher.best_match(&screen, &template)? else {
            return Ok(None);
        };
        trace!(template = %id, score = best.score, threshold, "best template window");
        if best.score < threshold {
            return Ok(None);
        }

        let geometry = active.geometry;
        Ok(Some(TemplateMatch {
            x: geometry.left + (best.x + template.width() / 2) as i32,
            y: geometry.top + (best.y + template.height() / 2) as i32,
            score: best.score,
        }))
    }

    /// [`locate`](Self::locate), with every error reported as no match.
    pub fn find(&self, id: TemplateId, threshold: f32) -> Option<TemplateMatch> {
        match self.locate(id, threshold) {
            Ok(found) => found,
            Err(e) => {
                debug!(template = %id, "scan failed: {e}");
                None
            }
        }
    }
}

impl fmt::Debug for TemplateScanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateScanner")
            .field("library", &self.library)
            .field("has_matcher", &self.matcher.is_some())
            .finish_non_exhaustive()
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::mock::{FixedMatcher, ScriptedCapturer};
    use crate::capability::{JpegCodec, MatchCandidate, SampledMatcher};
    use crate::geometry::MonitorGeometry;
    use image::Rgb;

    fn write_png(dir: &Path, name: &str, image: &RgbImage) {
        image.save(dir.join(name)).unwrap();
    }

    fn button() -> RgbImage {
        RgbImage::from_fn(12, 8, |x, y| Rgb([(x * 20) as u8, (y * 30) as u8, 200]))
    }

    fn second_display() -> (ScriptedCapturer, Arc<MonitorState>) {
        let capturer = ScriptedCapturer::with_displays(&[
            MonitorGeometry::new(0, 0, 64, 48),
            MonitorGeometry::new(64, 0, 64, 48),
        ]);
        let monitors = Arc::new(MonitorState::with_initial_index(2));
        monitors.begin_session(vec![
            MonitorGeometry::new(0, 0, 128, 48),
            MonitorGeometry::new(0, 0, 64, 48),
            MonitorGeometry::new(64, 0, 64, 48),
        ]);
        (capturer, monitors)
    }

    #[test]
    fn library_loads_once_and_caches() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), DEFAULT_ACCEPT_TEMPLATE, &button());
        let library = TemplateLibrary::new(dir.path(), Arc::new(JpegCodec));

        let first = library.load(TemplateId::Accept).unwrap();
        std::fs::remove_file(dir.path().join(DEFAULT_ACCEPT_TEMPLATE)).unwrap();
        let second = library.load(TemplateId::Accept).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.dimensions(), (12, 8));
    }

    #[test]
    fn missing_template_stays_missing() {
        let dir = tempfile::tempdir().unwrap();
        let library = TemplateLibrary::new(dir.path(), Arc::new(JpegCodec));
        assert!(matches!(
            library.load(TemplateId::Retry),
            Err(MatchError::TemplateUnavailable { .. })
        ));

        // Appearing later does not help: the failure is cached.
        write_png(dir.path(), DEFAULT_RETRY_TEMPLATE, &button());
        assert!(library.load(TemplateId::Retry).is_err());
    }

    #[test]
    fn file_names_can_be_overridden() {
        let library = TemplateLibrary::new("/opt/assets", Arc::new(JpegCodec))
            .with_file(TemplateId::Accept, "ok.png");
        assert_eq!(library.path(TemplateId::Accept), PathBuf::from("/opt/assets/ok.png"));
        assert_eq!(
            library.path(TemplateId::Retry),
            PathBuf::from("/opt/assets").join(DEFAULT_RETRY_TEMPLATE)
        );
    }

    #[test]
    fn locate_reports_absolute_center() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), DEFAULT_ACCEPT_TEMPLATE, &button());
        let (capturer, monitors) = second_display();
        let matcher = FixedMatcher::new(Some(MatchCandidate {
            x: 10,
            y: 20,
            score: 0.95,
        }));
        let scanner = TemplateScanner::new(
            Arc::new(capturer.clone()),
            Some(Arc::new(matcher)),
            TemplateLibrary::new(dir.path(), Arc::new(JpegCodec)),
            monitors,
        );

        let found = scanner.locate(TemplateId::Accept, 0.92).unwrap().unwrap();
        assert_eq!((found.x, found.y), (64 + 10 + 6, 20 + 4));
        assert_eq!(capturer.grabbed(), vec![MonitorGeometry::new(64, 0, 64, 48)]);
    }

    #[test]
    fn below_threshold_is_no_match() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), DEFAULT_ACCEPT_TEMPLATE, &button());
        let (capturer, monitors) = second_display();
        let matcher = FixedMatcher::new(Some(MatchCandidate {
            x: 0,
            y: 0,
            score: 0.91,
        }));
        let scanner = TemplateScanner::new(
            Arc::new(capturer),
            Some(Arc::new(matcher)),
            TemplateLibrary::new(dir.path(), Arc::new(JpegCodec)),
            monitors,
        );
        assert_eq!(scanner.locate(TemplateId::Accept, 0.92).unwrap(), None);
    }

    #[test]
    fn real_matcher_finds_a_planted_button() {
        let dir = tempfile::tempdir().unwrap();
        let template = button();
        write_png(dir.path(), DEFAULT_ACCEPT_TEMPLATE, &template);

        let mut screen = RgbImage::from_pixel(64, 48, Rgb([10, 10, 10]));
        image::imageops::replace(&mut screen, &template, 30, 16);
        let (capturer, monitors) = second_display();
        capturer.set_screen(Some(screen));

        let scanner = TemplateScanner::new(
            Arc::new(capturer),
            Some(Arc::new(SampledMatcher::default())),
            TemplateLibrary::new(dir.path(), Arc::new(JpegCodec)),
            monitors,
        );
        let found = scanner.locate(TemplateId::Accept, 0.92).unwrap().unwrap();
        assert_eq!((found.x, found.y), (64 + 30 + 6, 16 + 4));
        assert!(found.score > 0.99);
    }

    #[test]
    fn failures_degrade_to_no_match() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), DEFAULT_ACCEPT_TEMPLATE, &button());
        let (capturer, monitors) = second_display();
        capturer.fail_next_opens(1);
        let scanner = TemplateScanner::new(
            Arc::new(capturer),
            Some(Arc::new(FixedMatcher::new(None))),
            TemplateLibrary::new(dir.path(), Arc::new(JpegCodec)),
            monitors,
        );
        assert!(matches!(
            scanner.locate(TemplateId::Accept, 0.5),
            Err(MatchError::Capture(_))
        ));
        assert_eq!(scanner.find(TemplateId::Retry, 0.5), None);
    }

    #[test]
    fn no_active_monitor_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), DEFAULT_ACCEPT_TEMPLATE, &button());
        let scanner = TemplateScanner::new(
            Arc::new(ScriptedCapturer::new(Vec::new())),
            Some(Arc::new(FixedMatcher::new(None))),
            TemplateLibrary::new(dir.path(), Arc::new(JpegCodec)),
            Arc::new(MonitorState::new()),
        );
        assert!(matches!(
            scanner.locate(TemplateId::Accept, 0.5),
            Err(MatchError::NoActiveMonitor)
        ));
    }

    #[test]
    fn absent_matcher_never_matches() {
        let (capturer, monitors) = second_display();
        let scanner = TemplateScanner::new(
            Arc::new(capturer.clone()),
            None,
            TemplateLibrary::new("/nonexistent", Arc::new(JpegCodec)),
            monitors,
        );
        assert_eq!(scanner.locate(TemplateId::Accept, 0.0).unwrap(), None);
        assert_eq!(scanner.find(TemplateId::Accept, 0.0), None);
        assert_eq!(capturer.opens(), 0);
    }
}
