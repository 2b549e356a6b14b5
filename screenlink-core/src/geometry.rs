//! Screen geometry and the stream-space → real-space mapping.
//!
//! The controller only ever sees the downscaled frames, so every inbound
//! coordinate is in *stream space*. A [`CoordinateTransform`] converts
//! those back to *real space* (absolute virtual-desktop pixels):
//!
//! ```text
//! real_x = floor(stream_x * scale_x) + offset_x
//! real_y = floor(stream_y * scale_y) + offset_y
//! ```
//!
//! A transform is always built from one captured frame and its monitor,
//! so offset and scale can never come from different capture generations.

use serde::{Deserialize, Serialize};

// ── MonitorGeometry ──────────────────────────────────────────────

/// Position and size of one display, as reported by the capture backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MonitorGeometry {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

impl MonitorGeometry {
    pub const fn new(left: i32, top: i32, width: u32, height: u32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Smallest rectangle covering every monitor in `monitors`.
    pub fn bounding(monitors: &[MonitorGeometry]) -> Option<MonitorGeometry> {
        let first = monitors.first()?;
        let (mut l, mut t) = (first.left, first.top);
        let (mut r, mut b) = (first.right(), first.bottom());
        for m in &monitors[1..] {
            l = l.min(m.left);
            t = t.min(m.top);
            r = r.max(m.right());
            b = b.max(m.bottom());
        }
        Some(MonitorGeometry::new(l, t, (r - l) as u32, (b - t) as u32))
    }

    pub fn right(&self) -> i32 {
        self.left + self.width as i32
    }

    pub fn bottom(&self) -> i32 {
        self.top + self.height as i32
    }
}

impl std::fmt::Display for MonitorGeometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}x{} at ({}, {})",
            self.width, self.height, self.left, self.top
        )
    }
}

// ── CoordinateTransform ──────────────────────────────────────────

/// Scale and offset committed by the frame producer for one frame.
///
/// Always copied out as a whole; there are no setters for individual
/// fields.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateTransform {
    offset_x: i32,
    offset_y: i32,
    scale_x: f64,
    scale_y: f64,
}

impl CoordinateTransform {
    /// Identity scale, zero offset. The state before any frame exists.
    pub const IDENTITY: CoordinateTransform = CoordinateTransform {
        offset_x: 0,
        offset_y: 0,
        scale_x: 1.0,
        scale_y: 1.0,
    };

    /// Build a transform for frames of `monitor` downscaled per `plan`.
    pub fn for_frame(monitor: &MonitorGeometry, plan: &ScalePlan) -> Self {
        Self {
            offset_x: monitor.left,
            offset_y: monitor.top,
            scale_x: plan.scale_x,
            scale_y: plan.scale_y,
        }
    }

    /// Build a transform from raw parts. Scales below 1.0 are raised to 1.0.
    pub fn new(offset_x: i32, offset_y: i32, scale_x: f64, scale_y: f64) -> Self {
        Self {
            offset_x,
            offset_y,
            scale_x: scale_x.max(1.0),
            scale_y: scale_y.max(1.0),
        }
    }

    pub fn offset(&self) -> (i32, i32) {
        (self.offset_x, self.offset_y)
    }

    pub fn scale(&self) -> (f64, f64) {
        (self.scale_x, self.scale_y)
    }

    /// Map a stream-space point to real screen space.
    ///
    /// Out-of-range input saturates at the `i32` bounds; NaN maps to the
    /// offset.
    pub fn to_real(&self, x: f64, y: f64) -> (i32, i32) {
        (
            place(x, self.scale_x, self.offset_x),
            place(y, self.scale_y, self.offset_y),
        )
    }

    /// Approximate inverse of [`to_real`](Self::to_real).
    pub fn to_stream(&self, x: i32, y: i32) -> (f64, f64) {
        (
            (i64::from(x) - i64::from(self.offset_x)) as f64 / self.scale_x,
            (i64::from(y) - i64::from(self.offset_y)) as f64 / self.scale_y,
        )
    }
}

/// `floor(stream * scale) + offset`, computed wide and clamped.
fn place(stream: f64, scale: f64, offset: i32) -> i32 {
    let scaled = (stream * scale).floor() as i64;
    let real = scaled.saturating_add(i64::from(offset));
    real.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

impl Default for CoordinateTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

// ── ScalePlan ────────────────────────────────────────────────────

/// Output size and resulting scale factors for one raw frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalePlan {
    pub width: u32,
    pub height: u32,
    pub scale_x: f64,
    pub scale_y: f64,
}

impl ScalePlan {
    /// Plan the downscale of a `raw_width`×`raw_height` frame so that it is
    /// at most `target_width` wide. Narrower frames are left untouched.
    pub fn for_frame(raw_width: u32, raw_height: u32, target_width: u32) -> Self {
        if raw_width <= target_width || target_width == 0 {
            return Self {
                width: raw_width,
                height: raw_height,
                scale_x: 1.0,
                scale_y: 1.0,
            };
        }

        let ratio = target_width as f64 / raw_width as f64;
        let height = ((raw_height as f64 * ratio) as u32).max(1);
        Self {
            width: target_width,
            height,
            scale_x: raw_width as f64 / target_width as f64,
            scale_y: raw_height as f64 / height as f64,
        }
    }

    /// Whether a resize is needed at all.
    pub fn resizes(&self) -> bool {
        self.scale_x != 1.0 || self.scale_y != 1.0
    }
}

// ── Tests ────────────────────────────────────────────────────────
