//! Turns inbound commands into injected input and state changes.
//!
//! Commands run one at a time, in arrival order: a command's settle
//! delays hold up the next command. Injection failures are logged here
//! and never reported to the controller; every handled command still
//! emits its `log` line.

use std::sync::Arc;

use futures::StreamExt;
use tokio::io::AsyncRead;
use tracing::{debug, info, trace, warn};

use crate::automation::{AutoAccept, MatchThresholds, TemplateId};
use crate::capability::{Key, Keystroke};
use crate::context::AgentContext;
use crate::error::{AgentError, InjectError};
use crate::protocol::{Command, LoopRequest, command_stream};

fn paste_chord() -> Keystroke {
    Keystroke::chord(&[Key::Control, Key::Char('v')])
}

fn interrupt_chord() -> Keystroke {
    Keystroke::chord(&[Key::Control, Key::Char('c')])
}

fn confirm_chord() -> Keystroke {
    Keystroke::chord(&[Key::Alt, Key::Enter])
}

/// Log an injection failure; the command carries on regardless.
fn check(action: &str, result: Result<(), InjectError>) {
    if let Err(e) = result {
        warn!("{action} failed: {e}");
    }
}

// ── CommandDispatcher ────────────────────────────────────────────

pub struct CommandDispatcher {
    ctx: AgentContext,
    auto_accept: AutoAccept,
    retry_threshold: f32,
}

impl CommandDispatcher {
    pub fn new(ctx: AgentContext, thresholds: MatchThresholds) -> Self {
        let auto_accept = AutoAccept::new(
            Arc::clone(&ctx.scanner),
            Arc::clone(&ctx.controls),
            ctx.outbox.clone(),
            ctx.timings,
            thresholds.accept,
        );
        Self {
            ctx,
            auto_accept,
            retry_threshold: thresholds.retry,
        }
    }

    pub fn auto_accept(&self) -> &AutoAccept {
        &self.auto_accept
    }

    /// Read and execute commands until the stream ends.
    ///
    /// Malformed lines are dropped. Only an I/O error on `reader` is
    /// returned.
    pub async fn run<R>(&self, reader: R) -> Result<(), AgentError>
    where
        R: AsyncRead + Unpin,
    {
        let mut commands = command_stream(reader);
        while let Some(item) = commands.next().await {
            match item? {
                Ok(command) => self.dispatch(command).await,
                Err(e) => debug!("dropping inbound line: {e}"),
            }
        }
        info!("inbound stream closed");
        Ok(())
    }

    /// Execute one command to completion.
    pub async fn dispatch(&self, command: Command) {
        debug!(kind = command.kind(), "dispatching command");
        match command {
            Command::SwitchMonitor => {
                self.ctx.monitors.request_switch();
                self.log("Monitor switch requested").await;
            }
            Command::SetMonitor { index } => {
                self.ctx.monitors.request_monitor(index);
                self.log(format!("Monitor {index} requested")).await;
            }
            Command::MouseClick { x, y } => {
                let (rx, ry) = self.ctx.transform.to_real(x, y);
                check("click", self.ctx.controls.click(rx, ry));
                self.log(format!("Clicked at ({rx}, {ry})")).await;
            }
            Command::MouseMove { x, y } => {
                // High frequency while dragging; no controller log.
                let (rx, ry) = self.ctx.transform.to_real(x, y);
                trace!(x = rx, y = ry, "pointer move");
                check("pointer move", self.ctx.controls.move_to(rx, ry));
            }
            Command::InputText {
                text,
                dialog_x,
                dialog_y,
            } => {
                if let (Some(x), Some(y)) = (dialog_x, dialog_y) {
                    self.click_and_settle(x, y).await;
                }
                if !text.is_empty() {
                    self.paste_and_enter(&text).await;
                }
                self.log(format!("Typed and Enter: {text}")).await;
            }
            Command::KeyTap { key } => match key.parse::<Keystroke>() {
                Ok(keystroke) => {
                    check("key tap", self.ctx.controls.press(&keystroke));
                    self.log(format!("Pressed {keystroke}")).await;
                }
                Err(e) => warn!("dropping KEY_TAP: {e}"),
            },
            Command::TimedLoopStart(request) | Command::MacroLoopStart(request) => {
                self.submit_and_check(request).await;
            }
            Command::AutoAcceptStart => {
                if self.auto_accept.start() {
                    self.log("Auto Accept All started").await;
                } else {
                    self.log("Auto Accept already running").await;
                }
            }
            Command::AutoAcceptStop => {
                if self.auto_accept.stop().is_some() {
                    self.log("Auto Accept All stopped").await;
                } else {
                    self.log("Auto Accept not running").await;
                }
            }
            Command::RestartTerminal { x, y, command } => {
                self.restart_terminal(x, y, &command).await;
            }
        }
    }

    // ── Choreographies ───────────────────────────────────────────

    async fn click_and_settle(&self, x: f64, y: f64) {
        let (rx, ry) = self.ctx.transform.to_real(x, y);
        check("focus click", self.ctx.controls.click(rx, ry));
        tokio::time::sleep(self.ctx.timings.focus_settle).await;
    }

    /// Clipboard, settle, paste chord. Direct typing is unreliable for
    /// arbitrary Unicode, so all text goes through the clipboard.
    async fn paste(&self, text: &str) {
        check("clipboard write", self.ctx.controls.set_clipboard(text));
        tokio::time::sleep(self.ctx.timings.clipboard_settle).await;
        check("paste", self.ctx.controls.press(&paste_chord()));
    }

    async fn paste_and_enter(&self, text: &str) {
        self.paste(text).await;
        tokio::time::sleep(self.ctx.timings.paste_to_enter).await;
        check("enter", self.ctx.controls.press(&Keystroke::single(Key::Enter)));
    }

    /// One-shot submission: optional click and text, the confirm chord,
    /// then a probe for the retry button.
    ///
    /// No retry button is taken to mean the submission went through. That
    /// is a guess; nothing else reports success.
    async fn submit_and_check(&self, request: LoopRequest) {
        if let (Some(x), Some(y)) = (request.x, request.y) {
            self.click_and_settle(x, y).await;
        }
        if let Some(text) = request.text.as_deref().filter(|t| !t.is_empty()) {
            self.paste_and_enter(text).await;
        }
        check("confirm", self.ctx.controls.press(&confirm_chord()));
        self.log("Submitted with Alt+Enter").await;

        tokio::time::sleep(self.ctx.timings.retry_probe_delay).await;
        let scanner = Arc::clone(&self.ctx.scanner);
        let threshold = self.retry_threshold;
        let found = tokio::task::spawn_blocking(move || scanner.find(TemplateId::Retry, threshold))
            .await
            .unwrap_or_else(|e| {
                warn!("retry probe task failed: {e}");
                None
            });

        match found {
            Some(retry) => {
                check("retry click", self.ctx.controls.click(retry.x, retry.y));
                self.log(format!("Retry button found, clicked at ({}, {})", retry.x, retry.y))
                    .await;
            }
            None => self.log("No retry button, submission presumed successful").await,
        }
    }

    /// Click, Ctrl+C, wait for teardown, paste the command, Enter.
    async fn restart_terminal(&self, x: f64, y: f64, command: &str) {
        let timings = self.ctx.timings;
        let (rx, ry) = self.ctx.transform.to_real(x, y);
        check("terminal click", self.ctx.controls.click(rx, ry));
        tokio::time::sleep(timings.restart_click_settle).await;

        check("interrupt", self.ctx.controls.press(&interrupt_chord()));
        tokio::time::sleep(timings.restart_teardown).await;

        self.paste(command).await;
        tokio::time::sleep(timings.restart_paste_settle).await;
        check("enter", self.ctx.controls.press(&Keystroke::single(Key::Enter)));

        self.log(format!("Terminal restarted at ({rx}, {ry})")).await;
    }

    async fn log(&self, message: impl Into<String>) {
        let message = message.into();
        info!("{message}");
        self.ctx.outbox.log(message).await;
    }
}

impl std::fmt::Debug for CommandDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandDispatcher")
            .field("auto_accept", &self.auto_accept)
            .field("retry_threshold", &self.retry_threshold)
            .finish_non_exhaustive()
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::{TemplateLibrary, TemplateScanner};
    use crate::capability::mock::{
        Action, ActionLog, FixedMatcher, RecordingClipboard, RecordingInjector, ScriptedCapturer,
    };
    use crate::capability::{JpegCodec, MatchCandidate};
    use crate::controls::Controls;
    use crate::geometry::{CoordinateTransform, MonitorGeometry};
    use crate::protocol::{Outbound, Outbox, io::OUTBOX_CAPACITY};
    use crate::state::{MonitorState, SharedTransform, SwitchRequest};
    use crate::timing::Timings;
    use image::{Rgb, RgbImage};
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::Instant;

    struct Rig {
        dispatcher: CommandDispatcher,
        actions: ActionLog,
        matcher: FixedMatcher,
        monitors: Arc<MonitorState>,
        transform: Arc<SharedTransform>,
        rx: mpsc::Receiver<Outbound>,
        _assets: tempfile::TempDir,
    }

    impl Rig {
        fn logs(&mut self) -> Vec<String> {
            let mut out = Vec::new();
            while let Ok(message) = self.rx.try_recv() {
                if let Outbound::Log { message } = message {
                    out.push(message);
                }
            }
            out
        }
    }

    fn rig() -> Rig {
        let assets = tempfile::tempdir().unwrap();
        RgbImage::from_pixel(20, 10, Rgb([200, 0, 0]))
            .save(assets.path().join("retry_button.png"))
            .unwrap();

        let displays = [
            MonitorGeometry::new(0, 0, 1920, 1080),
            MonitorGeometry::new(1920, 0, 1920, 1080),
        ];
        let capturer = ScriptedCapturer::with_displays(&displays);
        let monitors = Arc::new(MonitorState::new());
        monitors.begin_session(vec![
            MonitorGeometry::bounding(&displays).unwrap(),
            displays[0],
            displays[1],
        ]);
        let transform = Arc::new(SharedTransform::new());

        let actions = ActionLog::default();
        let controls = Arc::new(Controls::new(
            Box::new(RecordingInjector::new(actions.clone())),
            Box::new(RecordingClipboard::new(actions.clone())),
        ));
        let matcher = FixedMatcher::new(None);
        let scanner = Arc::new(TemplateScanner::new(
            Arc::new(capturer),
            Some(Arc::new(matcher.clone())),
            TemplateLibrary::new(assets.path(), Arc::new(JpegCodec)),
            Arc::clone(&monitors),
        ));
        let (outbox, rx) = Outbox::channel(OUTBOX_CAPACITY);

        let ctx = AgentContext {
            monitors: Arc::clone(&monitors),
            transform: Arc::clone(&transform),
            controls,
            scanner,
            outbox,
            timings: Timings::default(),
        };
        Rig {
            dispatcher: CommandDispatcher::new(ctx, MatchThresholds::default()),
            actions,
            matcher,
            monitors,
            transform,
            rx,
            _assets: assets,
        }
    }

    fn enter() -> Action {
        Action::Tap(Key::Enter)
    }

    fn paste() -> Action {
        Action::Chord(vec![Key::Control, Key::Char('v')])
    }

    #[tokio::test(start_paused = true)]
    async fn click_uses_committed_transform() {
        let mut rig = rig();
        rig.transform
            .commit(CoordinateTransform::new(1920, 0, 1.875, 1.875));

        rig.dispatcher
            .dispatch(Command::MouseClick { x: 512.0, y: 288.0 })
            .await;

        assert_eq!(rig.actions.actions(), vec![Action::Click(2880, 540)]);
        assert_eq!(rig.logs(), vec!["Clicked at (2880, 540)"]);
    }

    #[tokio::test(start_paused = true)]
    async fn out_of_range_clicks_are_clamped() {
        let mut rig = rig();
        rig.transform
            .commit(CoordinateTransform::new(1920, 0, 1.875, 1.875));

        let commands: Vec<Command> = [
            r#"{"type":"MOUSE_CLICK","x":1e12,"y":288}"#,
            r#"{"type":"MOUSE_CLICK","x":-1e12,"y":288}"#,
        ]
        .iter()
        .map(|line| crate::protocol::parse_command(line).unwrap())
        .collect();
        for command in commands {
            rig.dispatcher.dispatch(command).await;
        }

        assert_eq!(rig.actions.clicks(), vec![(i32::MAX, 540), (i32::MIN, 540)]);
        assert_eq!(
            rig.logs(),
            vec![
                format!("Clicked at ({}, 540)", i32::MAX),
                format!("Clicked at ({}, 540)", i32::MIN),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn pointer_moves_are_silent() {
        let mut rig = rig();
        rig.transform.commit(CoordinateTransform::new(100, 50, 2.0, 2.0));
        rig.dispatcher
            .dispatch(Command::MouseMove { x: 10.0, y: 10.0 })
            .await;
        assert_eq!(rig.actions.actions(), vec![Action::Move(120, 70)]);
        assert!(rig.logs().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn monitor_commands_only_record_requests() {
        let mut rig = rig();
        rig.dispatcher.dispatch(Command::SwitchMonitor).await;
        assert_eq!(rig.monitors.snapshot().pending, Some(SwitchRequest::Next));

        rig.dispatcher.dispatch(Command::SetMonitor { index: 9 }).await;
        let snapshot = rig.monitors.snapshot();
        assert_eq!(snapshot.pending, Some(SwitchRequest::Jump(9)));
        assert_eq!(snapshot.current_index, 1);

        assert_eq!(rig.logs().len(), 2);
        assert!(rig.actions.actions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn input_text_clicks_settles_then_pastes() {
        let mut rig = rig();
        let start = Instant::now();
        rig.dispatcher
            .dispatch(Command::InputText {
                text: "你好".into(),
                dialog_x: Some(10.0),
                dialog_y: Some(20.0),
            })
            .await;

        assert_eq!(start.elapsed(), Duration::from_millis(700));
        assert_eq!(
            rig.actions.actions(),
            vec![
                Action::Click(10, 20),
                Action::Clipboard("你好".into()),
                paste(),
                enter(),
            ]
        );
        assert_eq!(rig.logs(), vec!["Typed and Enter: 你好"]);
    }

    #[tokio::test(start_paused = true)]
    async fn input_text_without_dialog_skips_the_click() {
        let rig = rig();
        rig.dispatcher
            .dispatch(Command::InputText {
                text: "hi".into(),
                dialog_x: Some(1.0),
                dialog_y: None,
            })
            .await;
        assert_eq!(
            rig.actions.actions(),
            vec![Action::Clipboard("hi".into()), paste(), enter()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn key_tap_parses_names_and_chords() {
        let mut rig = rig();
        rig.dispatcher.dispatch(Command::KeyTap { key: "escape".into() }).await;
        rig.dispatcher.dispatch(Command::KeyTap { key: "ALT_ENTER".into() }).await;
        rig.dispatcher.dispatch(Command::KeyTap { key: "warp".into() }).await;

        assert_eq!(
            rig.actions.actions(),
            vec![Action::Tap(Key::Escape), Action::Chord(vec![Key::Alt, Key::Enter])]
        );
        assert_eq!(rig.logs().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn loop_start_without_retry_presumes_success() {
        let mut rig = rig();
        let start = Instant::now();
        rig.dispatcher
            .dispatch(Command::TimedLoopStart(LoopRequest {
                x: Some(4.0),
                y: Some(8.0),
                text: Some("continue".into()),
            }))
            .await;

        assert!(start.elapsed() >= Duration::from_millis(2_700));
        assert_eq!(
            rig.actions.actions(),
            vec![
                Action::Click(4, 8),
                Action::Clipboard("continue".into()),
                paste(),
                enter(),
                Action::Chord(vec![Key::Alt, Key::Enter]),
            ]
        );
        assert_eq!(rig.matcher.calls(), 1);
        let logs = rig.logs();
        assert_eq!(logs.last().unwrap(), "No retry button, submission presumed successful");
    }

    #[tokio::test(start_paused = true)]
    async fn macro_loop_clicks_a_visible_retry_button() {
        let mut rig = rig();
        rig.matcher.set_answer(Some(MatchCandidate {
            x: 100,
            y: 200,
            score: 0.9,
        }));
        rig.dispatcher
            .dispatch(Command::MacroLoopStart(LoopRequest::default()))
            .await;

        // Retry button is 20x10 on monitor 1 at the origin.
        assert_eq!(
            rig.actions.actions(),
            vec![Action::Chord(vec![Key::Alt, Key::Enter]), Action::Click(110, 205)]
        );
        assert!(rig.logs().last().unwrap().starts_with("Retry button found"));
    }

    #[tokio::test(start_paused = true)]
    async fn restart_terminal_follows_the_fixed_choreography() {
        let mut rig = rig();
        let start = Instant::now();
        rig.dispatcher
            .dispatch(Command::RestartTerminal {
                x: 30.0,
                y: 40.0,
                command: "npm start".into(),
            })
            .await;

        assert_eq!(start.elapsed(), Duration::from_millis(4_100));
        assert_eq!(
            rig.actions.actions(),
            vec![
                Action::Click(30, 40),
                Action::Chord(vec![Key::Control, Key::Char('c')]),
                Action::Clipboard("npm start".into()),
                paste(),
                enter(),
            ]
        );
        assert_eq!(rig.logs(), vec!["Terminal restarted at (30, 40)"]);
    }

    #[tokio::test(start_paused = true)]
    async fn injection_failures_still_log() {
        let log = ActionLog::default();
        let injector = RecordingInjector::new(log.clone());
        injector.set_failing(true);
        let mut rig = rig();
        rig.dispatcher.ctx.controls = Arc::new(Controls::new(
            Box::new(injector),
            Box::new(RecordingClipboard::new(log.clone())),
        ));

        rig.dispatcher
            .dispatch(Command::MouseClick { x: 1.0, y: 1.0 })
            .await;
        assert!(log.actions().is_empty());
        assert_eq!(rig.logs(), vec!["Clicked at (1, 1)"]);
    }

    #[tokio::test(start_paused = true)]
    async fn auto_accept_commands_toggle_a_single_loop() {
        let mut rig = rig();
        rig.dispatcher.dispatch(Command::AutoAcceptStop).await;
        rig.dispatcher.dispatch(Command::AutoAcceptStart).await;
        rig.dispatcher.dispatch(Command::AutoAcceptStart).await;
        assert!(rig.dispatcher.auto_accept().is_running());
        rig.dispatcher.dispatch(Command::AutoAcceptStop).await;
        assert!(!rig.dispatcher.auto_accept().is_running());

        assert_eq!(
            rig.logs(),
            vec![
                "Auto Accept not running",
                "Auto Accept All started",
                "Auto Accept already running",
                "Auto Accept All stopped",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn run_drops_bad_lines_and_keeps_reading() {
        let rig = rig();
        let input: &[u8] = b"not json\n{\"x\":1}\n{\"type\":\"NOPE\"}\n{\"type\":\"MOUSE_CLICK\",\"x\":3,\"y\":4}\n";
        rig.dispatcher.run(input).await.unwrap();
        assert_eq!(rig.actions.clicks(), vec![(3, 4)]);
    }

    #[tokio::test(start_paused = true)]
    async fn run_ends_on_read_error() {
        let rig = rig();
        let reader = tokio_test::io::Builder::new()
            .read(b"{\"type\":\"KEY_TAP\",\"key\":\"space\"}\n")
            .read_error(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone"))
            .build();
        let result = rig.dispatcher.run(reader).await;
        assert!(matches!(result, Err(AgentError::Io(_))));
        assert_eq!(rig.actions.actions(), vec![Action::Tap(Key::Space)]);
    }
}
