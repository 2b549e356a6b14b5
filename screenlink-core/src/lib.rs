//! # screenlink-core
//!
//! Runtime for a remote-screen-control agent: it streams a live view of
//! one display to a controller and executes the controller's commands.
//!
//! This crate contains:
//! - **Protocol**: line-delimited JSON `Command` / `Outbound` types and the
//!   `AgentCodec` framing over any duplex byte stream
//! - **State**: `MonitorState` (display selection and pending switches) and
//!   `SharedTransform` (stream → screen coordinate mapping)
//! - **Stream**: `FrameProducer`, the capture → downscale → encode loop
//! - **Dispatch**: `CommandDispatcher`, which turns commands into input
//! - **Automation**: template scanning and the `AutoAccept` loop
//! - **Capabilities**: traits for capture, input, clipboard, matching and
//!   image coding, with default and platform backends plus test doubles
//! - **Error**: one `thiserror` enum per concern, and `AgentError`

pub mod automation;
pub mod capability;
pub mod context;
pub mod controls;
pub mod dispatch;
pub mod error;
pub mod geometry;
pub mod platform;
pub mod protocol;
pub mod state;
pub mod stream;
pub mod timing;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use automation::{AutoAccept, MatchThresholds, TemplateId, TemplateLibrary, TemplateScanner};
pub use capability::{JpegCodec, SampledMatcher};
pub use context::AgentContext;
pub use controls::Controls;
pub use dispatch::CommandDispatcher;
pub use error::{AgentError, CaptureError, CodecError, InjectError, MatchError, ProtocolError};
pub use geometry::{CoordinateTransform, MonitorGeometry, ScalePlan};
pub use protocol::{AgentCodec, Command, Outbound, Outbox};
pub use state::{MonitorState, SharedTransform};
pub use stream::{FrameProducer, StreamConfig};
pub use timing::Timings;
