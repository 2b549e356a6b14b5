//! Live frame production.

pub mod producer;

pub use producer::{FrameProducer, StreamConfig};
