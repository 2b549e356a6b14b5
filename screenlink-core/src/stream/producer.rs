//! Capture → downscale → encode → emit, paced to a target frame rate.
//!
//! The producer owns the capture-side transitions of [`MonitorState`] and
//! is the only writer of [`SharedTransform`]. It runs two nested loops:
//!
//! 1. **Session loop**: open a capture session, install its monitor list
//!    and pick the active display. Session failures are logged and
//!    retried after a backoff, forever.
//! 2. **Frame loop**: while no switch is pending, grab one frame, commit
//!    the transform for it, encode it and queue it on the [`Outbox`].
//!    A failed grab skips the tick.
//!
//! A pending switch ends the frame loop; the switch is applied and the
//! session is reopened so the backend binds to the new geometry.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::capability::{CaptureSession, ImageCodec, ScreenCapturer};
use crate::error::{AgentError, CaptureError};
use crate::geometry::{CoordinateTransform, MonitorGeometry, ScalePlan};
use crate::protocol::Outbox;
use crate::state::{MonitorState, SharedTransform};

// ── StreamConfig ─────────────────────────────────────────────────

/// Tuning for [`FrameProducer`].
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Target frames per second (1..=60).
    pub fps: u32,
    /// Frames wider than this are downscaled to exactly this width.
    pub target_width: u32,
    /// Lossy quality factor (1..=100).
    pub jpeg_quality: u8,
    /// Pause before reopening a failed capture session.
    pub session_backoff: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            fps: 15,
            target_width: 1024,
            jpeg_quality: 50,
            session_backoff: Duration::from_secs(1),
        }
    }
}

impl StreamConfig {
    /// Wall-clock budget of one frame.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.fps.clamp(1, 60) as f64)
    }
}

enum SessionEnd {
    /// A monitor switch was applied; reopen.
    Switched,
    /// The stop flag was cleared.
    Stopped,
}

// ── FrameProducer ────────────────────────────────────────────────

/// The frame pipeline.
///
/// ```no_run
/// # use screenlink_core::stream::FrameProducer;
/// # async fn example(producer: FrameProducer) {
/// let handle = producer.stop_handle();
/// tokio::spawn(async move { producer.run().await });
/// // … later …
/// handle.store(false, std::sync::atomic::Ordering::SeqCst);
/// # }
/// ```
pub struct FrameProducer {
    capturer: Arc<dyn ScreenCapturer>,
    codec: Arc<dyn ImageCodec>,
    monitors: Arc<MonitorState>,
    transform: Arc<SharedTransform>,
    outbox: Outbox,
    config: StreamConfig,
    running: Arc<AtomicBool>,
}

impl FrameProducer {
    pub fn new(
        capturer: Arc<dyn ScreenCapturer>,
        codec: Arc<dyn ImageCodec>,
        monitors: Arc<MonitorState>,
        transform: Arc<SharedTransform>,
        outbox: Outbox,
        config: StreamConfig,
    ) -> Self {
        Self {
            capturer,
            codec,
            monitors,
            transform,
            outbox,
            config,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// A cloneable handle that can be used to stop the producer from
    /// another task.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Stop the producer. Takes effect at the next frame boundary, and
    /// before `run` if it has not started yet.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run until stopped or until the outbound channel closes.
    ///
    /// Capture failures never end this loop.
    pub async fn run(&self) -> Result<(), AgentError> {
        while self.is_running() {
            match self.stream_session().await {
                Ok(SessionEnd::Switched) => continue,
                Ok(SessionEnd::Stopped) => break,
                Err(AgentError::ChannelClosed) => {
                    info!("outbound channel closed; frame producer exiting");
                    break;
                }
                Err(e) => {
                    warn!("capture session failed: {e}");
                    tokio::time::sleep(self.config.session_backoff).await;
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        debug!("frame producer stopped");
        Ok(())
    }

    // ── Internal ─────────────────────────────────────────────────

    async fn stream_session(&self) -> Result<SessionEnd, AgentError> {
        let mut session = self.capturer.open()?;
        let active = self
            .monitors
            .begin_session(session.monitors()?)
            .ok_or(CaptureError::NoMonitors)?;
        info!(index = active.index, "capturing monitor {}: {}", active.index, active.geometry);

        let interval = self.config.frame_interval();
        while self.is_running() {
            if self.monitors.switch_pending() {
                self.apply_switch().await;
                return Ok(SessionEnd::Switched);
            }

            let frame_start = Instant::now();
            match self.produce_frame(session.as_mut(), &active.geometry) {
                Ok(jpeg) => self.outbox.screen(jpeg).await?,
                Err(e) => trace!("frame skipped: {e}"),
            }
            pace(frame_start, interval).await;
        }
        Ok(SessionEnd::Stopped)
    }

    /// Grab, downscale and encode one frame of `monitor`.
    ///
    /// The transform for the frame is committed before it is encoded, so
    /// a command derived from this frame can never see an older mapping.
    fn produce_frame(
        &self,
        session: &mut dyn CaptureSession,
        monitor: &MonitorGeometry,
    ) -> Result<Vec<u8>, CaptureError> {
        let raw = session.grab(monitor)?;
        let image = raw.to_rgb_image()?;

        let plan = ScalePlan::for_frame(image.width(), image.height(), self.config.target_width);
        let image = if plan.resizes() {
            self.codec.downscale(&image, plan.width, plan.height)
        } else {
            image
        };

        self.transform
            .commit(CoordinateTransform::for_frame(monitor, &plan));
        Ok(self.codec.encode(&image, self.config.jpeg_quality)?)
    }

    async fn apply_switch(&self) {
        if self.monitors.snapshot().monitors.len() <= 1 {
            // Nothing to switch to; the session is still reopened.
            self.monitors.apply_switch();
            debug!("monitor switch ignored: single monitor");
            return;
        }
        let message = match self.monitors.apply_switch() {
            Some(active) => format!("Switching to Monitor {}: {}", active.index, active.geometry),
            None => {
                let index = self.monitors.snapshot().current_index;
                format!("Switching to Monitor {index}")
            }
        };
        info!("{message}");
        self.outbox.log(message).await;
    }
}

/// Sleep for the remainder of the frame interval.
async fn pace(frame_start: Instant, interval: Duration) {
    let elapsed = frame_start.elapsed();
    if elapsed < interval {
        tokio::time::sleep(interval - elapsed).await;
    }
}

// ── Tests ────────────────────────────────────────────────────────
