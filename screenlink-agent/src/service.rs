//! Agent service core logic.
//!
//! Wires the capability backends into the shared state and runs the
//! frame producer and the command dispatcher over one duplex stream.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{info, warn};

use screenlink_core::automation::{TemplateId, TemplateLibrary, TemplateScanner};
use screenlink_core::capability::{ImageCodec, JpegCodec, SampledMatcher, TemplateMatcher};
use screenlink_core::platform::{self, Backends};
use screenlink_core::protocol::Outbox;
use screenlink_core::protocol::io::{OUTBOX_CAPACITY, spawn_writer};
use screenlink_core::{
    AgentContext, AgentError, CommandDispatcher, Controls, FrameProducer, MonitorState,
    SharedTransform, Timings,
};

use crate::config::AgentConfig;

// ── AgentService ─────────────────────────────────────────────────

/// The top-level agent.
pub struct AgentService {
    config: AgentConfig,
}

impl AgentService {
    /// `config.automation.assets_dir` is used as given; resolve it first.
    pub fn new(config: AgentConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Run over stdin/stdout with the native backends.
    pub async fn run(&self) -> Result<(), AgentError> {
        self.run_with(platform::native(), tokio::io::stdin(), tokio::io::stdout())
            .await
    }

    /// Run until `reader` ends or fails.
    ///
    /// 1. Spawns the outbound writer over `writer`.
    /// 2. Spawns the frame producer.
    /// 3. Dispatches commands from `reader` on the current task.
    /// 4. On end of input, stops the producer and auto-accept loop and
    ///    drains the writer.
    pub async fn run_with<R, W>(
        &self,
        backends: Backends,
        reader: R,
        writer: W,
    ) -> Result<(), AgentError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (outbox, rx) = Outbox::channel(OUTBOX_CAPACITY);
        let writer = spawn_writer(writer, rx);

        let monitors = Arc::new(MonitorState::with_initial_index(
            self.config.stream.initial_monitor,
        ));
        let transform = Arc::new(SharedTransform::new());
        let codec: Arc<dyn ImageCodec> = Arc::new(JpegCodec);
        let matcher: Arc<dyn TemplateMatcher> = Arc::new(SampledMatcher::default());

        let automation = &self.config.automation;
        let library = TemplateLibrary::new(&automation.assets_dir, Arc::clone(&codec))
            .with_file(TemplateId::Accept, automation.accept_template.clone())
            .with_file(TemplateId::Retry, automation.retry_template.clone());
        info!("templates: {}", library.dir().display());

        let scanner = Arc::new(TemplateScanner::new(
            Arc::clone(&backends.capturer),
            Some(matcher),
            library,
            Arc::clone(&monitors),
        ));
        let producer = Arc::new(FrameProducer::new(
            backends.capturer,
            codec,
            Arc::clone(&monitors),
            Arc::clone(&transform),
            outbox.clone(),
            self.config.to_stream_config(),
        ));
        let dispatcher = CommandDispatcher::new(
            AgentContext {
                monitors,
                transform,
                controls: Arc::new(Controls::new(backends.injector, backends.clipboard)),
                scanner,
                outbox,
                timings: Timings::default(),
            },
            self.config.thresholds(),
        );

        let producer_task = {
            let producer = Arc::clone(&producer);
            tokio::spawn(async move { producer.run().await })
        };

        let result = dispatcher.run(reader).await;

        // Shutdown: every Outbox clone must drop before the writer exits.
        producer.stop();
        if let Some(handle) = dispatcher.auto_accept().stop() {
            let _ = handle.await;
        }
        if let Err(e) = producer_task.await {
            warn!("frame producer task failed: {e}");
        }
        drop(producer);
        drop(dispatcher);
        match writer.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("outbound writer failed: {e}"),
            Err(e) => warn!("outbound writer task failed: {e}"),
        }

        info!("agent stopped");
        result
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use screenlink_core::MonitorGeometry;
    use screenlink_core::capability::mock::{
        Action, ActionLog, RecordingClipboard, RecordingInjector, ScriptedCapturer,
    };
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    fn mock_backends(actions: &ActionLog) -> Backends {
        Backends {
            capturer: Arc::new(ScriptedCapturer::with_displays(&[
                MonitorGeometry::new(0, 0, 1920, 1080),
                MonitorGeometry::new(1920, 0, 1920, 1080),
            ])),
            injector: Box::new(RecordingInjector::new(actions.clone())),
            clipboard: Box::new(RecordingClipboard::new(actions.clone())),
        }
    }

    #[tokio::test]
    async fn streams_frames_and_executes_commands_until_eof() {
        let actions = ActionLog::default();
        let (mut controller_in, agent_in) = tokio::io::duplex(1024);
        let (agent_out, controller_out) = tokio::io::duplex(1 << 20);
        let service = AgentService::new(AgentConfig::default());

        let agent = tokio::spawn({
            let backends = mock_backends(&actions);
            async move { service.run_with(backends, agent_in, agent_out).await }
        });

        let mut lines = BufReader::new(controller_out).lines();
        let first = lines.next_line().await.unwrap().unwrap();
        assert!(first.starts_with(r#"{"type":"screen","data":""#), "{first}");

        // Keep draining so the writer never blocks on a full pipe.
        let rest = tokio::spawn(async move {
            let mut all = Vec::new();
            while let Some(line) = lines.next_line().await.unwrap() {
                all.push(line);
            }
            all
        });

        controller_in
            .write_all(b"{\"type\":\"MOUSE_CLICK\",\"x\":512,\"y\":288}\n")
            .await
            .unwrap();
        drop(controller_in);
        agent.await.unwrap().unwrap();

        assert_eq!(actions.actions(), vec![Action::Click(2880, 540)]);

        let saw_click_log = rest
            .await
            .unwrap()
            .iter()
            .any(|line| line == r#"{"type":"log","message":"Clicked at (2880, 540)"}"#);
        assert!(saw_click_log);
    }

    #[test]
    fn service_keeps_its_config() {
        let mut config = AgentConfig::default();
        config.stream.fps = 5;
        let service = AgentService::new(config);
        assert_eq!(service.config().stream.fps, 5);
    }
}
