use parking_lot::Mutex;

use crate::geometry::MonitorGeometry;

/// Index the agent starts on: the first individual display.
pub const DEFAULT_MONITOR_INDEX: usize = 1;

/// A pending monitor change, applied at the producer's next checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchRequest {
    /// Cycle to the next individual display (`SWITCH_MONITOR`).
    Next,
    /// Jump straight to an index (`SET_MONITOR`). Validated on reopen.
    Jump(usize),
}

/// The monitor currently being captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveMonitor {
    pub index: usize,
    pub geometry: MonitorGeometry,
}

/// A consistent copy of the whole monitor state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorSnapshot {
    pub monitors: Vec<MonitorGeometry>,
    pub current_index: usize,
    pub pending: Option<SwitchRequest>,
}

#[derive(Debug)]
struct Inner {
    monitors: Vec<MonitorGeometry>,
    current_index: usize,
    pending: Option<SwitchRequest>,
}

/// Which display is captured, and any switch waiting to be applied.
///
/// Command handlers only *record* requests; the frame producer applies
/// them between frames and reopens its capture session, so no frame is
/// ever grabbed against half-updated geometry.
#[derive(Debug)]
pub struct MonitorState {
    inner: Mutex<Inner>,
}

impl MonitorState {
    pub fn new() -> Self {
        Self::with_initial_index(DEFAULT_MONITOR_INDEX)
    }

    pub fn with_initial_index(index: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                monitors: Vec::new(),
                current_index: index,
                pending: None,
            }),
        }
    }

    // ── Capture side ─────────────────────────────────────────────

    /// Install the monitor list of a freshly opened capture session.
    ///
    /// Clamps the current index if the topology shrank (1 when at least
    /// one individual display exists, else 0). Returns `None` when the
    /// list is empty.
    pub fn begin_session(&self, monitors: Vec<MonitorGeometry>) -> Option<ActiveMonitor> {
        let mut inner = self.inner.lock();
        if monitors.is_empty() {
            inner.monitors.clear();
            return None;
        }
        if inner.current_index >= monitors.len() {
            inner.current_index = if monitors.len() > 1 { 1 } else { 0 };
        }
        inner.monitors = monitors;
        let index = inner.current_index;
        Some(ActiveMonitor {
            index,
            geometry: inner.monitors[index],
        })
    }

    /// Apply the pending request, if any, and clear it.
    ///
    /// Returns the newly selected monitor when its geometry is known in the
    /// current list. A `Jump` past the end yields `None` here and is
    /// clamped by the next [`begin_session`](Self::begin_session).
    pub fn apply_switch(&self) -> Option<ActiveMonitor> {
        let mut inner = self.inner.lock();
        let request = inner.pending.take()?;
        match request {
            SwitchRequest::Next => {
                let count = inner.monitors.len();
                if count > 1 {
                    inner.current_index = next_secondary_index(inner.current_index, count);
                }
            }
            SwitchRequest::Jump(index) => inner.current_index = index,
        }
        let index = inner.current_index;
        inner
            .monitors
            .get(index)
            .map(|&geometry| ActiveMonitor { index, geometry })
    }

    // ── Command side ─────────────────────────────────────────────

    /// Record a `SWITCH_MONITOR` request.
    pub fn request_switch(&self) {
        self.inner.lock().pending = Some(SwitchRequest::Next);
    }

    /// Record a `SET_MONITOR` request for `index`.
    pub fn request_monitor(&self, index: usize) {
        self.inner.lock().pending = Some(SwitchRequest::Jump(index));
    }

    // ── Readers ──────────────────────────────────────────────────

    pub fn switch_pending(&self) -> bool {
        self.inner.lock().pending.is_some()
    }

    /// The monitor of the open session, if its geometry is known.
    pub fn active(&self) -> Option<ActiveMonitor> {
        let inner = self.inner.lock();
        let index = inner.current_index;
        inner
            .monitors
            .get(index)
            .map(|&geometry| ActiveMonitor { index, geometry })
    }

    pub fn snapshot(&self) -> MonitorSnapshot {
        let inner = self.inner.lock();
        MonitorSnapshot {
            monitors: inner.monitors.clone(),
            current_index: inner.current_index,
            pending: inner.pending,
        }
    }
}

impl Default for MonitorState {
    fn default() -> Self {
        Self::new()
    }
}

/// Next individual display after `current` among `count` monitors.
///
/// Cycles through `1..count`, skipping index 0 (the combined desktop).
pub fn next_secondary_index(current: usize, count: usize) -> usize {
    if count <= 1 {
        return 0;
    }
    current % (count - 1) + 1
}

// ── Tests ─────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn desktop(n: usize) -> Vec<MonitorGeometry> {
        let displays: Vec<_> = (0..n)
            .map(|i| MonitorGeometry::new(i as i32 * 1920, 0, 1920, 1080))
            .collect();
        let mut all = vec![MonitorGeometry::bounding(&displays).unwrap()];
        all.extend(displays);
        all
    }

    #[test]
    fn initial_index_is_first_display() {
        let state = MonitorState::new();
        let active = state.begin_session(desktop(2)).unwrap();
        assert_eq!(active.index, 1);
        assert_eq!(active.geometry, MonitorGeometry::new(0, 0, 1920, 1080));
    }

    #[test]
    fn single_entry_list_clamps_to_zero() {
        let state = MonitorState::new();
        let only = vec![MonitorGeometry::new(0, 0, 1280, 720)];
        assert_eq!(state.begin_session(only).unwrap().index, 0);
    }

    #[test]
    fn empty_list_is_no_session() {
        let state = MonitorState::new();
        assert!(state.begin_session(Vec::new()).is_none());
        assert!(state.active().is_none());
    }

    #[test]
    fn cycling_visits_every_display_in_order() {
        for displays in 1..=5 {
            let monitors = desktop(displays);
            let count = monitors.len();
            let state = MonitorState::new();
            state.begin_session(monitors.clone());

            let mut visited = vec![state.active().unwrap().index];
            for _ in 0..(2 * displays) {
                state.request_switch();
                assert!(state.switch_pending());
                let active = state.apply_switch().unwrap();
                assert!(!state.switch_pending());
                state.begin_session(monitors.clone());
                visited.push(active.index);
            }

            assert!(visited.iter().all(|&i| i != 0));
            let expected: Vec<usize> = (0..visited.len()).map(|k| k % (count - 1) + 1).collect();
            assert_eq!(visited, expected, "{displays} displays");
        }
    }

    #[test]
    fn switch_with_single_entry_keeps_index() {
        let state = MonitorState::new();
        state.begin_session(vec![MonitorGeometry::new(0, 0, 800, 600)]);
        state.request_switch();
        assert_eq!(state.apply_switch().unwrap().index, 0);
        assert!(!state.switch_pending());
    }

    #[test]
    fn jump_is_validated_on_reopen() {
        let state = MonitorState::new();
        state.begin_session(desktop(2));

        state.request_monitor(7);
        assert!(state.apply_switch().is_none());
        assert_eq!(state.snapshot().current_index, 7);

        let active = state.begin_session(desktop(2)).unwrap();
        assert_eq!(active.index, 1);
    }

    #[test]
    fn jump_does_not_cycle() {
        let state = MonitorState::new();
        state.begin_session(desktop(3));
        state.request_monitor(3);
        assert_eq!(state.apply_switch().unwrap().index, 3);
        state.request_monitor(0);
        assert_eq!(state.apply_switch().unwrap().index, 0);
    }

    #[test]
    fn topology_shrink_clamps() {
        let state = MonitorState::new();
        state.begin_session(desktop(3));
        state.request_monitor(3);
        state.apply_switch();
        assert_eq!(state.begin_session(desktop(1)).unwrap().index, 1);
    }

    #[test]
    fn apply_without_request_is_noop() {
        let state = MonitorState::new();
        state.begin_session(desktop(2));
        assert!(state.apply_switch().is_none());
        assert_eq!(state.snapshot().current_index, 1);
    }

    #[test]
    fn next_secondary_index_wraps() {
        assert_eq!(next_secondary_index(1, 4), 2);
        assert_eq!(next_secondary_index(3, 4), 1);
        assert_eq!(next_secondary_index(0, 4), 1);
        assert_eq!(next_secondary_index(0, 1), 0);
    }
}
