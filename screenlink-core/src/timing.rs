//! Fixed settle delays for the injected-input choreographies.
//!
//! There is no feedback from the controlled application, so each step
//! waits a fixed time for the UI to catch up. The values are tuned for a
//! typical desktop; they are not derived from anything.

use std::time::Duration;

/// Named delays used by the dispatcher and the auto-accept loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    /// After clicking a text field, before pasting into it.
    pub focus_settle: Duration,
    /// After writing the clipboard, before the paste chord.
    pub clipboard_settle: Duration,
    /// After the paste chord, before Enter.
    pub paste_to_enter: Duration,
    /// After the confirm chord, before probing for the retry button.
    pub retry_probe_delay: Duration,
    /// After clicking the terminal, before Ctrl+C.
    pub restart_click_settle: Duration,
    /// After Ctrl+C, while the old process shuts down.
    pub restart_teardown: Duration,
    /// After pasting the restart command, before Enter.
    pub restart_paste_settle: Duration,
    /// Between auto-accept probes.
    pub poll_interval: Duration,
    /// Granularity at which the auto-accept wait checks for a stop.
    pub poll_tick: Duration,
    /// After an auto-accept click, so the same button is not hit twice.
    pub post_click_pause: Duration,
    /// After a failed auto-accept probe.
    pub error_backoff: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            focus_settle: Duration::from_millis(500),
            clipboard_settle: Duration::from_millis(100),
            paste_to_enter: Duration::from_millis(100),
            retry_probe_delay: Duration::from_millis(2000),
            restart_click_settle: Duration::from_millis(1000),
            restart_teardown: Duration::from_millis(2000),
            restart_paste_settle: Duration::from_millis(1000),
            poll_interval: Duration::from_millis(3000),
            poll_tick: Duration::from_millis(100),
            post_click_pause: Duration::from_millis(1000),
            error_backoff: Duration::from_millis(1000),
        }
    }
}
