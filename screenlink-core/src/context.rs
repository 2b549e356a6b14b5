//! Handles shared by the long-lived tasks.

use std::sync::Arc;

use crate::automation::TemplateScanner;
use crate::controls::Controls;
use crate::protocol::Outbox;
use crate::state::{MonitorState, SharedTransform};
use crate::timing::Timings;

/// Everything a command handler may touch.
///
/// Cheap to clone; all state lives behind the `Arc`s.
#[derive(Debug, Clone)]
pub struct AgentContext {
    pub monitors: Arc<MonitorState>,
    pub transform: Arc<SharedTransform>,
    pub controls: Arc<Controls>,
    pub scanner: Arc<TemplateScanner>,
    pub outbox: Outbox,
    pub timings: Timings,
}
