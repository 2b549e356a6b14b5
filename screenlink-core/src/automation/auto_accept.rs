//! Background loop that clicks the "accept" button whenever it appears.
//!
//! At most one loop runs at a time. Each loop owns its own stop flag, so a
//! quick stop-then-start can never leave two loops alive. Waits are split
//! into short ticks that re-check the flag, which bounds how long a stop
//! takes to land by one tick.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::templates::{TemplateId, TemplateScanner};
use crate::controls::Controls;
use crate::protocol::Outbox;
use crate::timing::Timings;

/// Default similarity required before an accept click.
pub const DEFAULT_ACCEPT_THRESHOLD: f32 = 0.92;

struct LoopContext {
    scanner: Arc<TemplateScanner>,
    controls: Arc<Controls>,
    outbox: Outbox,
    timings: Timings,
    threshold: f32,
}

struct Worker {
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Start/stop handle for the auto-accept loop.
pub struct AutoAccept {
    context: Arc<LoopContext>,
    worker: Mutex<Option<Worker>>,
}

impl AutoAccept {
    pub fn new(
        scanner: Arc<TemplateScanner>,
        controls: Arc<Controls>,
        outbox: Outbox,
        timings: Timings,
        threshold: f32,
    ) -> Self {
        Self {
            context: Arc::new(LoopContext {
                scanner,
                controls,
                outbox,
                timings,
                threshold,
            }),
            worker: Mutex::new(None),
        }
    }

    /// Spawn the loop unless one is already running.
    ///
    /// Returns `true` when a new loop was started. Must be called from
    /// within a Tokio runtime.
    pub fn start(&self) -> bool {
        let mut worker = self.worker.lock();
        if worker.as_ref().is_some_and(|w| w.running.load(Ordering::SeqCst)) {
            return false;
        }
        let running = Arc::new(AtomicBool::new(true));
        let handle = tokio::spawn(poll_loop(Arc::clone(&self.context), Arc::clone(&running)));
        *worker = Some(Worker { running, handle });
        true
    }

    /// Signal the running loop to exit.
    ///
    /// Returns its task handle, or `None` if nothing was running. The
    /// handle resolves within one poll tick.
    pub fn stop(&self) -> Option<JoinHandle<()>> {
        let worker = self.worker.lock().take()?;
        worker.running.store(false, Ordering::SeqCst);
        Some(worker.handle)
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .is_some_and(|w| w.running.load(Ordering::SeqCst))
    }
}

impl Drop for AutoAccept {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.get_mut().take() {
            worker.running.store(false, Ordering::SeqCst);
        }
    }
}

impl std::fmt::Debug for AutoAccept {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoAccept")
            .field("running", &self.is_running())
            .field("threshold", &self.context.threshold)
            .finish()
    }
}

// ── Loop ─────────────────────────────────────────────────────────

async fn poll_loop(ctx: Arc<LoopContext>, running: Arc<AtomicBool>) {
    info!("auto-accept loop started");
    let tick = ctx.timings.poll_tick;

    while running.load(Ordering::SeqCst) {
        let scanner = Arc::clone(&ctx.scanner);
        let threshold = ctx.threshold;
        let probe =
            tokio::task::spawn_blocking(move || scanner.locate(TemplateId::Accept, threshold)).await;

        match probe {
            Ok(Ok(Some(found))) => {
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                match ctx.controls.click(found.x, found.y) {
                    Ok(()) => {
                        info!(x = found.x, y = found.y, score = found.score, "auto-accept click");
                        ctx.outbox
                            .log(format!("Auto clicked Accept at ({}, {})", found.x, found.y))
                            .await;
                    }
                    Err(e) => warn!("auto-accept click failed: {e}"),
                }
                wait_while_running(&running, ctx.timings.post_click_pause, tick).await;
            }
            Ok(Ok(None)) => {}
            Ok(Err(e)) => {
                debug!("auto-accept probe failed: {e}");
                wait_while_running(&running, ctx.timings.error_backoff, tick).await;
            }
            Err(e) => {
                warn!("auto-accept probe task failed: {e}");
                wait_while_running(&running, ctx.timings.error_backoff, tick).await;
            }
        }

        wait_while_running(&running, ctx.timings.poll_interval, tick).await;
    }
    info!("auto-accept loop stopped");
}

/// Sleep up to `total`, in steps of `tick`, returning early on stop.
async fn wait_while_running(running: &AtomicBool, total: Duration, tick: Duration) {
    let tick = tick.max(Duration::from_millis(1));
    let deadline = Instant::now() + total;
    while running.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        tokio::time::sleep((deadline - now).min(tick)).await;
    }
}

// ── Tests ────────────────────────────────────────────────────────
